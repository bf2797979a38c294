use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The HMC log an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Security,
    Audit,
}

impl LogType {
    pub const ALL: [LogType; 2] = [LogType::Security, LogType::Audit];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Security => "security",
            LogType::Audit => "audit",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "security" => Ok(LogType::Security),
            "audit" => Ok(LogType::Audit),
            other => Err(format!("unknown log type '{other}' (expected security or audit)")),
        }
    }
}

/// Value type of a substitution variable, as reported by the HMC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataItemKind {
    Long,
    Float,
    String,
}

/// One substitution variable of a log message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    pub number: u32,
    pub value: String,
    pub kind: DataItemKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailMessage {
    pub message: String,
    pub data_items: Vec<DataItem>,
}

/// One log entry as received from the log source.
///
/// Entries are immutable once received. Ordering within a run is by
/// `(timestamp, sequence)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub log_type: LogType,
    pub sequence: u64,
    pub timestamp: DateTime<FixedOffset>,
    pub message_number: String,
    pub name: String,
    pub message: String,
    pub user: Option<String>,
    pub source_address: Option<String>,
    pub data_items: Vec<DataItem>,
    pub details: Vec<DetailMessage>,
}

impl LogEntry {
    pub fn new(
        log_type: LogType,
        sequence: u64,
        timestamp: DateTime<FixedOffset>,
        message_number: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            log_type,
            sequence,
            timestamp,
            message_number: message_number.into(),
            name: String::new(),
            message: message.into(),
            user: None,
            source_address: None,
            data_items: Vec::new(),
            details: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_source_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = Some(address.into());
        self
    }

    pub fn with_data_items(mut self, mut items: Vec<DataItem>) -> Self {
        items.sort_by_key(|item| item.number);
        self.data_items = items;
        self
    }

    pub fn with_details(mut self, details: Vec<DetailMessage>) -> Self {
        self.details = details;
        self
    }

    /// Sort key used by replay: timestamp first, source sequence breaks ties.
    pub fn order_key(&self) -> (DateTime<FixedOffset>, u64) {
        (self.timestamp, self.sequence)
    }

    /// Identity of an entry independent of the source-assigned sequence, so the
    /// same HMC entry fetched twice compares equal.
    pub fn fingerprint(&self) -> EntryFingerprint {
        EntryFingerprint {
            log_type: self.log_type,
            timestamp: self.timestamp,
            message_number: self.message_number.clone(),
            message: self.message.clone(),
            user: self.user.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryFingerprint {
    log_type: LogType,
    timestamp: DateTime<FixedOffset>,
    message_number: String,
    message: String,
    user: Option<String>,
}
