//! Forwarding
//!
//! One named route from a set of log types to a destination, with the
//! formatter that renders records for it.

use crate::app::config::{Config, DestKind, FormatKind, ForwardingConfig};
use crate::catalog::Classification;
use crate::destination::{
    ConsoleDestination, ConsoleStream, Destination, DestinationError, SyslogConfig,
    SyslogDestination,
};
use crate::domain::{ForwarderError, LogEntry, LogType};
use crate::formatter::{FormatContext, Formatter};
use tracing::{debug, info, warn};

/// What happened to one entry on one forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// A non-fatal destination error; the record is lost for this
    /// forwarding only.
    Dropped,
}

pub struct Forwarding {
    name: String,
    logs: Vec<LogType>,
    destination: Box<dyn Destination>,
    formatter: Formatter,
    banner: bool,
    delivered: u64,
    dropped: u64,
}

impl Forwarding {
    pub fn new(
        name: impl Into<String>,
        logs: Vec<LogType>,
        destination: Box<dyn Destination>,
        formatter: Formatter,
    ) -> Self {
        Self {
            name: name.into(),
            logs,
            destination,
            formatter,
            banner: false,
            delivered: 0,
            dropped: 0,
        }
    }

    /// Frame the output with a header and rules on open and close.
    pub fn with_banner(mut self, banner: bool) -> Self {
        self.banner = banner;
        self
    }

    pub fn from_config(
        forwarding: &ForwardingConfig,
        config: &Config,
    ) -> Result<Self, ForwarderError> {
        let context =
            FormatContext::new(config.label()).with_check_data(config.check_data.clone());
        let formatter = match forwarding.format {
            FormatKind::Line => {
                Formatter::line(&forwarding.line_format, &forwarding.time_format, context)?
            }
            FormatKind::Cadf => Formatter::cadf(&forwarding.time_format, context)?,
        };

        let destination: Box<dyn Destination> = match forwarding.dest {
            DestKind::Stdout => Box::new(ConsoleDestination::new(ConsoleStream::Stdout)),
            DestKind::Stderr => Box::new(ConsoleDestination::new(ConsoleStream::Stderr)),
            DestKind::Syslog => {
                let host = forwarding.syslog_host.clone().unwrap_or_default();
                Box::new(SyslogDestination::new(SyslogConfig::new(
                    host,
                    forwarding.syslog_port,
                    forwarding.syslog_porttype,
                    forwarding.syslog_facility,
                ))?)
            }
        };

        let banner = forwarding.dest != DestKind::Syslog && forwarding.format == FormatKind::Line;
        Ok(Self::new(&forwarding.name, forwarding.logs.clone(), destination, formatter)
            .with_banner(banner))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logs(&self) -> &[LogType] {
        &self.logs
    }

    pub fn destination(&self) -> String {
        self.destination.describe()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.logs.contains(&entry.log_type)
    }

    pub async fn open(&mut self) -> Result<(), DestinationError> {
        info!(
            forwarding = %self.name,
            dest = %self.destination.describe(),
            "Opening forwarding"
        );
        self.destination.open().await?;

        if self.banner
            && let Some(header) = self.formatter.header()
        {
            self.destination.write(&header).await?;
            self.destination.write(&Formatter::rule()).await?;
        }
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), DestinationError> {
        if self.banner && self.formatter.header().is_some() {
            self.destination.write(&Formatter::rule()).await?;
        }
        self.destination.close().await?;
        debug!(
            forwarding = %self.name,
            delivered = self.delivered,
            dropped = self.dropped,
            "Closed forwarding"
        );
        Ok(())
    }

    /// Render and write one entry. Only fatal destination errors are
    /// returned.
    pub async fn deliver(
        &mut self,
        entry: &LogEntry,
        classification: &Classification<'_>,
    ) -> Result<Delivery, DestinationError> {
        let record = self.formatter.render(entry, classification);
        match self.destination.write(&record).await {
            Ok(()) => {
                self.delivered += 1;
                Ok(Delivery::Delivered)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.dropped += 1;
                warn!(
                    forwarding = %self.name,
                    log = %entry.log_type,
                    id = %entry.message_number,
                    error = %e,
                    "Dropping log entry"
                );
                Ok(Delivery::Dropped)
            }
        }
    }
}

impl std::fmt::Debug for Forwarding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarding")
            .field("name", &self.name)
            .field("logs", &self.logs)
            .field("destination", &self.destination.describe())
            .finish_non_exhaustive()
    }
}
