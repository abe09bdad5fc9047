//! Bounded request/response history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

const MAX_RECORDED_CHARS: usize = 4096;
const TRUNCATION_MARK: &str = "...(truncated)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub request: String,
    pub response: String,
}

/// Ring buffer of the most recent exchanges, newest first on read.
#[derive(Debug)]
pub struct History {
    capacity: usize,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, request: &str, response: &str) {
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            at: Utc::now(),
            request: truncate(request, MAX_RECORDED_CHARS),
            response: truncate(response, MAX_RECORDED_CHARS),
        };
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_back();
        }
        entries.push_front(entry);
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &s[..cut], TRUNCATION_MARK),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_and_bounded() {
        let history = History::new(3);
        for i in 0..5 {
            history.record(&format!("req{i}"), &format!("res{i}"));
        }
        let recent = history.recent();
        assert_eq!(recent.len(), 3);
        let reqs: Vec<&str> = recent.iter().map(|e| e.request.as_str()).collect();
        assert_eq!(reqs, vec!["req4", "req3", "req2"]);
        assert_ne!(recent[0].id, recent[1].id);
    }

    #[test]
    fn test_truncation() {
        let history = History::new(1);
        let long = "x".repeat(5000);
        history.record(&long, "ok");
        let entry = &history.recent()[0];
        assert!(entry.request.ends_with(TRUNCATION_MARK));
        assert_eq!(entry.request.len(), 4096 + TRUNCATION_MARK.len());
        assert_eq!(entry.response, "ok");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let s = "允".repeat(5000);
        let out = truncate(&s, MAX_RECORDED_CHARS);
        assert_eq!(out.chars().count(), 4096 + TRUNCATION_MARK.len());
    }

    #[test]
    fn test_zero_capacity_clamps() {
        let history = History::new(0);
        history.record("a", "b");
        history.record("c", "d");
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.recent()[0].request, "c");
    }
}
