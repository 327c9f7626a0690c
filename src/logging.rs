use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::event_sink::EventSink;

/// Default maximum number of log lines to keep in memory
pub const DEFAULT_MAX_LOG_LINES: usize = 10000;

/// Sentinel meaning the gauge has never been set
const NO_PROGRESS: u8 = u8::MAX;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: String,
    pub level: String,
    pub message: String,
}

/// In-memory sink that keeps the most recent `max_lines` lines and the last
/// gauge value. Safe to share between the scheduler and the watcher.
pub struct LogManager {
    logs: Mutex<VecDeque<LogEntry>>,
    progress: AtomicU8,
    max_lines: usize,
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_LINES)
    }
}

impl LogManager {
    pub fn new(max_lines: usize) -> Self {
        Self {
            logs: Mutex::new(VecDeque::with_capacity(max_lines.min(1024))),
            progress: AtomicU8::new(NO_PROGRESS),
            max_lines,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        // A panic in another writer leaves the deque itself intact
        self.logs.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn log(&self, level: &str, message: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        let entry = LogEntry {
            id: now.clone(),
            timestamp: now,
            level: level.to_string(),
            message: message.to_string(),
        };

        let mut logs = self.lock();
        logs.push_back(entry);

        // Remove from front if full
        while logs.len() > self.max_lines {
            logs.pop_front();
        }
    }

    pub fn get_logs(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Message text only, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().map(|entry| entry.message.clone()).collect()
    }

    pub fn get_logs_paginated(&self, offset: usize, limit: usize) -> Vec<LogEntry> {
        self.lock().iter().skip(offset).take(limit).cloned().collect()
    }

    pub fn latest_progress(&self) -> Option<u8> {
        match self.progress.load(Ordering::SeqCst) {
            NO_PROGRESS => None,
            value => Some(value),
        }
    }
}

impl EventSink for LogManager {
    fn append_line(&self, line: &str) {
        self.log("info", line);
    }

    fn set_progress(&self, percent: u8) {
        self.progress.store(percent.min(100), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_manager_new() {
        let manager = LogManager::new(100);
        assert!(manager.get_logs().is_empty());
        assert_eq!(manager.latest_progress(), None);
    }

    #[test]
    fn test_log_manager_rotation() {
        let manager = LogManager::new(3);

        // Add more logs than max_lines
        for i in 0..5 {
            manager.log("info", &format!("message {}", i));
        }

        let lines = manager.lines();
        assert_eq!(lines, vec!["message 2", "message 3", "message 4"]);
    }

    #[test]
    fn test_log_manager_pagination() {
        let manager = LogManager::new(100);

        for i in 0..20 {
            manager.log("info", &format!("message {}", i));
        }

        let page1 = manager.get_logs_paginated(0, 10);
        assert_eq!(page1.len(), 10);
        assert_eq!(page1[0].message, "message 0");

        let page2 = manager.get_logs_paginated(10, 10);
        assert_eq!(page2.len(), 10);
        assert_eq!(page2[9].message, "message 19");

        // Offset beyond available
        assert!(manager.get_logs_paginated(20, 10).is_empty());
    }

    #[test]
    fn test_event_sink_impl() {
        let manager = LogManager::new(10);
        manager.append_line("Backup complete.");
        manager.set_progress(140);

        let logs = manager.get_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, "info");
        assert_eq!(manager.latest_progress(), Some(100));
    }

    #[test]
    fn test_default_max_log_lines() {
        assert_eq!(DEFAULT_MAX_LOG_LINES, 10000);
    }
}
