use super::{LiveStream, LogSource, SourceError};
use crate::domain::{LogEntry, LogType};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::debug;

/// A log source backed by memory.
///
/// Historical entries are held in a vector. Live entries are read from
/// mpsc channels handed out by [`MemorySource::live_channel`]; each call to
/// `subscribe_live` consumes the next channel, so resubscribing after the
/// stream ended needs a second channel.
#[derive(Debug)]
pub struct MemorySource {
    now: DateTime<FixedOffset>,
    version: Option<String>,
    historical: Vec<LogEntry>,
    arriving_on_subscribe: Vec<LogEntry>,
    live: VecDeque<mpsc::Receiver<LogEntry>>,
    subscriptions: usize,
    closed: bool,
}

impl MemorySource {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now,
            version: None,
            historical: Vec::new(),
            arriving_on_subscribe: Vec::new(),
            live: VecDeque::new(),
            subscriptions: 0,
            closed: false,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_historical(mut self, entries: Vec<LogEntry>) -> Self {
        self.historical.extend(entries);
        self
    }

    /// Entries that become historical at the moment a subscription opens,
    /// i.e. entries produced between the end of replay and the subscription.
    pub fn with_gap_entries(mut self, entries: Vec<LogEntry>) -> Self {
        self.arriving_on_subscribe.extend(entries);
        self
    }

    /// Open a live channel for a future subscription.
    pub fn live_channel(&mut self, capacity: usize) -> mpsc::Sender<LogEntry> {
        let (tx, rx) = mpsc::channel(capacity);
        self.live.push_back(rx);
        tx
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl LogSource for MemorySource {
    async fn current_time(&mut self) -> Result<DateTime<FixedOffset>, SourceError> {
        Ok(self.now)
    }

    async fn appliance_version(&mut self) -> Result<Option<String>, SourceError> {
        Ok(self.version.clone())
    }

    async fn fetch_historical(
        &mut self,
        log_type: LogType,
        since: Option<DateTime<FixedOffset>>,
    ) -> Result<Vec<LogEntry>, SourceError> {
        let mut entries: Vec<LogEntry> = self
            .historical
            .iter()
            .filter(|e| e.log_type == log_type)
            .filter(|e| since.is_none_or(|since| e.timestamp >= since))
            .cloned()
            .collect();
        entries.sort_by_key(LogEntry::order_key);
        Ok(entries)
    }

    async fn subscribe_live(
        &mut self,
        log_types: &[LogType],
    ) -> Result<Box<dyn LiveStream>, SourceError> {
        let receiver = self.live.pop_front().ok_or_else(|| {
            SourceError::Subscription("no live channel left to subscribe to".to_string())
        })?;
        self.subscriptions += 1;
        self.historical.append(&mut self.arriving_on_subscribe);
        debug!(subscription = self.subscriptions, "Opened in-memory live stream");
        Ok(Box::new(MemoryLiveStream {
            receiver,
            log_types: log_types.to_vec(),
        }))
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.closed = true;
        Ok(())
    }
}

struct MemoryLiveStream {
    receiver: mpsc::Receiver<LogEntry>,
    log_types: Vec<LogType>,
}

#[async_trait]
impl LiveStream for MemoryLiveStream {
    async fn next(&mut self) -> Result<Option<LogEntry>, SourceError> {
        while let Some(entry) = self.receiver.recv().await {
            if self.log_types.contains(&entry.log_type) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}
