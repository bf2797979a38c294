#![warn(rust_2018_idioms)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_lossless,            // Infallible casts are clear enough with `as`
    clippy::cast_possible_truncation, // Safe within realistic value bounds (durations, sizes)
    clippy::missing_errors_doc,       // Internal API
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. CatalogLoadError in catalog module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

pub mod app;
pub mod catalog;
pub mod collector;
pub mod destination;
pub mod domain;
pub mod formatter;
pub mod forwarding;
pub mod parser;
pub mod pipeline;
pub mod reliability;

// Re-export main types for easy access
pub use app::{App, Config};
pub use catalog::MessageCatalog;
pub use domain::{ForwarderError, LogEntry, LogType};
pub use forwarding::Forwarding;
pub use pipeline::{Dispatcher, DispatcherConfig, RunSummary};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
