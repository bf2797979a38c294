use crate::collector::StartPoint;
use crate::collector::hmc::DEFAULT_HMC_PORT;
use crate::destination::syslog::DEFAULT_SYSLOG_PORT;
use crate::destination::{ConsoleStream, Facility, Transport};
use crate::domain::LogType;
use crate::formatter::{DEFAULT_LINE_FORMAT, DEFAULT_TIME_FORMAT};
use serde::{Deserialize, Deserializer};

pub fn default_hmc_port() -> u16 {
    DEFAULT_HMC_PORT
}

pub fn default_live_poll_interval() -> u64 {
    5
}

pub fn default_selflog_dest() -> ConsoleStream {
    ConsoleStream::Stdout
}

pub fn default_selflog_format() -> String {
    super::file::DEFAULT_SELFLOG_FORMAT.to_string()
}

pub fn default_time_format() -> String {
    DEFAULT_TIME_FORMAT.to_string()
}

pub fn default_line_format() -> String {
    DEFAULT_LINE_FORMAT.to_string()
}

pub fn default_logs() -> Vec<LogType> {
    LogType::ALL.to_vec()
}

pub fn default_syslog_port() -> u16 {
    DEFAULT_SYSLOG_PORT
}

pub fn default_syslog_porttype() -> Transport {
    Transport::Tcp
}

pub fn default_syslog_facility() -> Facility {
    Facility::User
}

/// `since`: `now`, `all`, or a date and time string.
pub fn start_point<'de, D>(deserializer: D) -> Result<StartPoint, D::Error>
where
    D: Deserializer<'de>,
{
    let setting = String::deserialize(deserializer)?;
    StartPoint::parse(&setting).map_err(serde::de::Error::custom)
}
