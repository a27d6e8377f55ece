//! Bounded, newest-first event log.

use crate::types::LogEvent;
use std::collections::VecDeque;

/// Ring of the most recent [`LogEvent`]s. New entries go to the front; once
/// the ring is full every insert evicts the oldest entry.
pub struct EventLog {
    entries: VecDeque<LogEvent>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn record(&mut self, entry: LogEvent) {
        self.entries.push_front(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    /// Entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEvent> {
        self.entries.iter()
    }

    /// The newest `limit` entries, cloned.
    pub fn recent(&self, limit: usize) -> Vec<LogEvent> {
        self.entries.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogId, LogLevel};
    use std::time::SystemTime;

    fn entry(message: &str) -> LogEvent {
        LogEvent {
            id: LogId::from(message),
            at: SystemTime::UNIX_EPOCH,
            level: LogLevel::Info,
            message: message.to_string(),
            devices: Vec::new(),
        }
    }

    #[test]
    fn newest_first() {
        let mut log = EventLog::new(10);
        log.record(entry("first"));
        log.record(entry("second"));
        log.record(entry("third"));

        let messages: Vec<&str> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["third", "second", "first"]);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut log = EventLog::new(3);
        for i in 0..5 {
            log.record(entry(&format!("m{i}")));
        }
        assert_eq!(log.len(), 3);
        let messages: Vec<&str> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["m4", "m3", "m2"]);
    }

    #[test]
    fn recent_limits_and_clones() {
        let mut log = EventLog::new(10);
        for i in 0..4 {
            log.record(entry(&format!("m{i}")));
        }
        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "m3");
        assert_eq!(recent[1].message, "m2");
        // Asking for more than exists returns everything.
        assert_eq!(log.recent(100).len(), 4);
    }
}
