mod cli;
mod file;
pub mod help;
pub mod serde_helpers;
mod validation;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub use cli::Args;
pub use file::{Config, DEFAULT_SELFLOG_FORMAT, ForwardingConfig, Secret};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    FileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid forwarding '{name}': {reason}")]
    InvalidForwarding { name: String, reason: String },
}

/// Destination of a forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestKind {
    Stdout,
    Stderr,
    Syslog,
}

/// Output format of a forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    #[default]
    Line,
    Cadf,
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatKind::Line => f.write_str("line"),
            FormatKind::Cadf => f.write_str("cadf"),
        }
    }
}
