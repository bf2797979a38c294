//! Log sources
//!
//! The pipeline reads log entries through [`LogSource`]: a historical query
//! per log type, and a live subscription that yields entries as the
//! appliance produces them.

pub mod hmc;
pub mod memory;

pub use hmc::{HmcConfig, HmcSource, VerifyCert};
pub use memory::MemorySource;

use crate::domain::{LogEntry, LogType};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Connection to {host} failed: {message}")]
    ConnectionFailed { host: String, message: String },
    #[error("Logon to {host} rejected: {message}")]
    Authentication { host: String, message: String },
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Invalid response from log source: {0}")]
    InvalidResponse(String),
    #[error("Live subscription failed: {0}")]
    Subscription(String),
    #[error("Timed out after {0:?} waiting for the log source")]
    Timeout(std::time::Duration),
    #[error("Invalid source configuration: {0}")]
    InvalidConfiguration(String),
}

/// Where replay of past entries begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPoint {
    /// The appliance's current time when the run starts.
    #[default]
    Now,
    /// Everything the appliance still has.
    All,
    Timestamp(DateTime<FixedOffset>),
}

impl StartPoint {
    /// Parse a `since` setting: `now`, `all`, or a date and time.
    ///
    /// A value carrying a UTC offset keeps it; without one the local zone is
    /// assumed. A bare time of day means today.
    pub fn parse(setting: &str) -> Result<Self, String> {
        let setting = setting.trim();
        match setting {
            "now" => return Ok(StartPoint::Now),
            "all" => return Ok(StartPoint::All),
            _ => {}
        }

        if let Some(with_zone) = parse_with_zone(setting) {
            return Ok(StartPoint::Timestamp(with_zone));
        }
        let naive = parse_naive(setting)
            .ok_or_else(|| format!("invalid date and time value '{setting}'"))?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|t| StartPoint::Timestamp(t.fixed_offset()))
            .ok_or_else(|| format!("'{setting}' does not exist in the local time zone"))
    }
}

fn parse_with_zone(setting: &str) -> Option<DateTime<FixedOffset>> {
    const ZONED_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

    DateTime::parse_from_rfc3339(setting).ok().or_else(|| {
        ZONED_FORMATS
            .iter()
            .find_map(|format| DateTime::parse_from_str(setting, format).ok())
    })
}

fn parse_naive(setting: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

    if let Some(naive) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(setting, format).ok())
    {
        return Some(naive);
    }
    if let Ok(date) = NaiveDate::parse_from_str(setting, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN));
    }
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(setting, format).ok())
        .map(|time| Local::now().date_naive().and_time(time))
}

impl fmt::Display for StartPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartPoint::Now => f.write_str("now"),
            StartPoint::All => f.write_str("all"),
            StartPoint::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

/// Entries pushed by the source after a subscription was opened.
#[async_trait]
pub trait LiveStream: Send {
    /// Next live entry, or `None` when the source ended the stream.
    async fn next(&mut self) -> Result<Option<LogEntry>, SourceError>;
}

#[async_trait]
pub trait LogSource: Send {
    /// Current time the start point `now` resolves to. The HMC source uses
    /// the forwarder's own clock.
    async fn current_time(&mut self) -> Result<DateTime<FixedOffset>, SourceError>;

    /// Appliance version, when the source can tell.
    async fn appliance_version(&mut self) -> Result<Option<String>, SourceError>;

    /// Past entries of one log type at or after `since`, ordered by
    /// `(timestamp, sequence)`.
    async fn fetch_historical(
        &mut self,
        log_type: LogType,
        since: Option<DateTime<FixedOffset>>,
    ) -> Result<Vec<LogEntry>, SourceError>;

    async fn subscribe_live(
        &mut self,
        log_types: &[LogType],
    ) -> Result<Box<dyn LiveStream>, SourceError>;

    async fn close(&mut self) -> Result<(), SourceError>;
}
