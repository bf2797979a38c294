//! Destinations
//!
//! A destination is the sink a forwarding writes rendered records to. Each
//! destination owns its I/O resource for the lifetime of its forwarding.

pub mod console;
pub mod syslog;

pub use console::{ConsoleDestination, ConsoleStream};
pub use syslog::{Facility, Severity, SyslogConfig, SyslogDestination, Transport};

use crate::formatter::RenderedRecord;
use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug)]
pub enum DestinationError {
    #[error("Cannot write to {stream}: {source}")]
    Console {
        stream: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Syslog transport error for {dest}: {source}")]
    Transport {
        dest: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Timed out during {operation} on {dest}")]
    Timeout { dest: String, operation: &'static str },
    #[error("Giving up on {dest} after {attempts} attempts: {last_error}")]
    Exhausted {
        dest: String,
        attempts: u32,
        last_error: String,
    },
    #[error("Invalid destination configuration: {0}")]
    InvalidConfiguration(String),
}

impl DestinationError {
    /// Fatal errors abort the whole run; all others drop the record for the
    /// forwarding that hit them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DestinationError::Console { .. } | DestinationError::InvalidConfiguration(_)
        )
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Destination: Send {
    /// Human-readable name used in self-log messages.
    fn describe(&self) -> String;

    async fn open(&mut self) -> Result<(), DestinationError>;

    async fn write(&mut self, record: &RenderedRecord) -> Result<(), DestinationError>;

    async fn close(&mut self) -> Result<(), DestinationError>;
}
