use crate::app::ConfigError;
use crate::catalog::CatalogLoadError;
use crate::collector::SourceError;
use crate::destination::DestinationError;
use crate::formatter::FormatError;
use thiserror::Error;

/// Top-level error type for the forwarder.
///
/// Every variant is fatal to a run. Transient destination failures and
/// unclassified messages never surface here.
#[derive(Error, Debug)]
pub enum ForwarderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Message catalog error: {0}")]
    CatalogLoad(#[from] CatalogLoadError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Destination error: {0}")]
    Destination(#[from] DestinationError),

    #[error("Log source error: {0}")]
    SourceConnection(#[from] SourceError),
}
