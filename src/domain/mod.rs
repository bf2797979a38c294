//! Domain layer for hmc-log-forwarder.
//!
//! Contains the canonical types shared across all modules:
//! - `LogEntry`: one HMC security or audit log entry
//! - `LogType`: which HMC log an entry belongs to
//! - `ForwarderError`: top-level error type

pub mod error;
pub mod log_entry;

pub use error::ForwarderError;
pub use log_entry::{DataItem, DataItemKind, DetailMessage, EntryFingerprint, LogEntry, LogType};
