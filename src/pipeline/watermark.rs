use crate::domain::{EntryFingerprint, LogEntry, LogType};
use chrono::{DateTime, FixedOffset};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Newest timestamp delivered so far for each log type, with the entries
/// delivered at exactly that timestamp.
///
/// The log types are fetched one after the other, so one type's newest
/// entry says nothing about how far the other type has been read.
#[derive(Debug, Default)]
pub(crate) struct Watermark {
    by_log: HashMap<LogType, Mark>,
}

#[derive(Debug)]
struct Mark {
    time: DateTime<FixedOffset>,
    at_time: HashSet<EntryFingerprint>,
}

impl Watermark {
    pub fn time(&self, log_type: LogType) -> Option<DateTime<FixedOffset>> {
        self.by_log.get(&log_type).map(|mark| mark.time)
    }

    pub fn is_behind(&self, entry: &LogEntry) -> bool {
        self.by_log
            .get(&entry.log_type)
            .is_some_and(|mark| entry.timestamp < mark.time)
    }

    /// Delivered at its log type's watermark timestamp already.
    pub fn has_seen(&self, entry: &LogEntry) -> bool {
        self.by_log.get(&entry.log_type).is_some_and(|mark| {
            mark.time == entry.timestamp && mark.at_time.contains(&entry.fingerprint())
        })
    }

    pub fn advance(&mut self, entry: &LogEntry) {
        match self.by_log.entry(entry.log_type) {
            Entry::Vacant(vacant) => {
                vacant.insert(Mark {
                    time: entry.timestamp,
                    at_time: HashSet::from([entry.fingerprint()]),
                });
            }
            Entry::Occupied(mut occupied) => {
                let mark = occupied.get_mut();
                if entry.timestamp == mark.time {
                    mark.at_time.insert(entry.fingerprint());
                } else if entry.timestamp > mark.time {
                    mark.time = entry.timestamp;
                    mark.at_time.clear();
                    mark.at_time.insert(entry.fingerprint());
                }
            }
        }
    }
}

/// Entries delivered by a catch-up fetch, per log type. A live stream may
/// repeat them until it passes the newest one of that type.
#[derive(Debug, Default)]
pub(crate) struct HandoffWindow {
    by_log: HashMap<LogType, Span>,
}

#[derive(Debug)]
struct Span {
    end: DateTime<FixedOffset>,
    delivered: HashSet<EntryFingerprint>,
}

impl HandoffWindow {
    pub fn record(&mut self, entry: &LogEntry) {
        let span = self.by_log.entry(entry.log_type).or_insert_with(|| Span {
            end: entry.timestamp,
            delivered: HashSet::new(),
        });
        span.delivered.insert(entry.fingerprint());
        if entry.timestamp > span.end {
            span.end = entry.timestamp;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_log.is_empty()
    }

    /// Whether a live entry repeats one delivered during catch-up. Closes
    /// the entry's log type once the stream moves past it.
    pub fn is_repeat(&mut self, entry: &LogEntry) -> bool {
        let Some(span) = self.by_log.get(&entry.log_type) else {
            return false;
        };
        if entry.timestamp > span.end {
            self.by_log.remove(&entry.log_type);
            return false;
        }
        span.delivered.contains(&entry.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logged(log_type: LogType, seconds: u32, seq: u64) -> LogEntry {
        let ts = DateTime::parse_from_rfc3339(&format!("2024-05-01T10:00:{seconds:02}+00:00")).unwrap();
        LogEntry::new(log_type, seq, ts, "1800", format!("entry {seq}"))
    }

    fn entry(seconds: u32, seq: u64) -> LogEntry {
        logged(LogType::Audit, seconds, seq)
    }

    #[test]
    fn test_watermark_tracks_newest_timestamp() {
        let mut watermark = Watermark::default();
        assert!(!watermark.is_behind(&entry(0, 1)));

        watermark.advance(&entry(5, 1));
        watermark.advance(&entry(5, 2));
        watermark.advance(&entry(3, 3));

        assert_eq!(watermark.time(LogType::Audit), Some(entry(5, 0).timestamp));
        assert!(watermark.has_seen(&entry(5, 2)));
        assert!(!watermark.has_seen(&entry(5, 9)));
        assert!(!watermark.has_seen(&entry(3, 3)));
        assert!(watermark.is_behind(&entry(4, 4)));

        watermark.advance(&entry(6, 5));
        assert!(!watermark.has_seen(&entry(5, 1)));
    }

    #[test]
    fn test_watermark_is_kept_per_log_type() {
        let mut watermark = Watermark::default();
        watermark.advance(&logged(LogType::Security, 5, 1));
        watermark.advance(&logged(LogType::Audit, 10, 2));

        assert_eq!(watermark.time(LogType::Security), Some(logged(LogType::Security, 5, 0).timestamp));
        assert!(!watermark.is_behind(&logged(LogType::Security, 7, 3)));
        assert!(watermark.is_behind(&logged(LogType::Audit, 7, 4)));
        assert!(!watermark.has_seen(&logged(LogType::Security, 10, 2)));
    }

    #[test]
    fn test_window_closes_after_newer_entry() {
        let mut window = HandoffWindow::default();
        window.record(&entry(1, 1));
        window.record(&entry(2, 2));

        assert!(window.is_repeat(&entry(1, 1)));
        assert!(!window.is_repeat(&entry(2, 3)));
        assert!(window.is_repeat(&entry(2, 2)));

        assert!(!window.is_repeat(&entry(3, 4)));
        assert!(window.is_empty());
        assert!(!window.is_repeat(&entry(1, 1)));
    }

    #[test]
    fn test_window_closes_per_log_type() {
        let mut window = HandoffWindow::default();
        window.record(&logged(LogType::Security, 7, 1));
        window.record(&logged(LogType::Audit, 3, 2));

        // A newer audit entry does not close the security span.
        assert!(!window.is_repeat(&logged(LogType::Audit, 20, 3)));
        assert!(window.is_repeat(&logged(LogType::Security, 7, 1)));
        assert!(!window.is_empty());
    }
}
