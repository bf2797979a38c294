#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use hmc_log_forwarder::destination::{Destination, DestinationError};
use hmc_log_forwarder::domain::{DataItem, DataItemKind, LogEntry, LogType};
use hmc_log_forwarder::formatter::RenderedRecord;
use std::sync::{Arc, Mutex};

pub fn at(seconds: u32) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(&format!("2019-08-09T12:46:{seconds:02}.550+02:00")).unwrap()
}

pub fn entry(log_type: LogType, seconds: u32, seq: u64, number: &str, message: &str) -> LogEntry {
    LogEntry::new(log_type, seq, at(seconds), number, message)
}

/// The logon of user `alice`, as the HMC reports it.
pub fn logon_entry(seconds: u32, seq: u64) -> LogEntry {
    entry(LogType::Security, seconds, seq, "1279", "User alice has logged on")
        .with_name("Logon")
        .with_user("alice")
        .with_data_items(vec![DataItem {
            number: 0,
            value: "alice".into(),
            kind: DataItemKind::String,
        }])
}

pub type Records = Arc<Mutex<Vec<RenderedRecord>>>;

/// Keeps every record written to it.
#[derive(Clone, Default)]
pub struct RecordingDestination {
    pub records: Records,
}

impl RecordingDestination {
    pub fn texts(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.as_str().to_string())
            .collect()
    }
}

#[async_trait]
impl Destination for RecordingDestination {
    fn describe(&self) -> String {
        "recording".to_string()
    }

    async fn open(&mut self) -> Result<(), DestinationError> {
        Ok(())
    }

    async fn write(&mut self, record: &RenderedRecord) -> Result<(), DestinationError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DestinationError> {
        Ok(())
    }
}

/// Fails every write the way an unreachable syslog server does.
#[derive(Clone, Default)]
pub struct UnreachableDestination {
    pub attempts: Arc<Mutex<u32>>,
}

#[async_trait]
impl Destination for UnreachableDestination {
    fn describe(&self) -> String {
        "syslog (unreachable)".to_string()
    }

    async fn open(&mut self) -> Result<(), DestinationError> {
        Ok(())
    }

    async fn write(&mut self, _record: &RenderedRecord) -> Result<(), DestinationError> {
        *self.attempts.lock().unwrap() += 1;
        Err(DestinationError::Exhausted {
            dest: self.describe(),
            attempts: 3,
            last_error: "connection refused".to_string(),
        })
    }

    async fn close(&mut self) -> Result<(), DestinationError> {
        Ok(())
    }
}
