//! Capped in-memory log of recorded detections, used for history and stats.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::detect::DetectionMethod;
use crate::text::truncate_chars;

/// Stored content is cut to this many characters.
pub const DETECTED_CONTENT_MAX_CHARS: usize = 500;
pub const DEFAULT_HISTORY_CAPACITY: usize = 2000;

#[derive(Debug, Clone, Serialize)]
pub struct DetectionEntry {
    pub id: u64,
    pub source_id: u64,
    pub source_name: String,
    pub post_id: Option<u64>,
    pub confidence: f64,
    pub method: DetectionMethod,
    pub detected_content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct LogState {
    entries: Vec<DetectionEntry>,
    next_id: u64,
}

#[derive(Debug)]
pub struct DetectionLog {
    inner: Mutex<LogState>,
    cap: usize,
}

impl DetectionLog {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 100_000);
        Self {
            inner: Mutex::new(LogState {
                entries: Vec::with_capacity(cap.min(10_000)),
                next_id: 1,
            }),
            cap,
        }
    }

    /// Append an entry; oldest entries fall off past capacity.
    pub fn push(
        &self,
        source_id: u64,
        source_name: &str,
        post_id: Option<u64>,
        confidence: f64,
        method: DetectionMethod,
        content: &str,
        at: DateTime<Utc>,
    ) -> DetectionEntry {
        let mut g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let entry = DetectionEntry {
            id: g.next_id,
            source_id,
            source_name: source_name.to_string(),
            post_id,
            confidence,
            method,
            detected_content: truncate_chars(content, DETECTED_CONTENT_MAX_CHARS),
            created_at: at,
        };
        g.next_id += 1;
        g.entries.push(entry.clone());
        if g.entries.len() > self.cap {
            let excess = g.entries.len() - self.cap;
            g.entries.drain(0..excess);
        }
        entry
    }

    /// Newest first, optionally restricted to one source.
    pub fn recent(&self, source_id: Option<u64>, limit: usize) -> Vec<DetectionEntry> {
        let g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        g.entries
            .iter()
            .rev()
            .filter(|e| source_id.map_or(true, |id| e.source_id == id))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn purge_source(&self, source_id: u64) -> usize {
        let mut g = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let before = g.entries.len();
        g.entries.retain(|e| e.source_id != source_id);
        before - g.entries.len()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DetectionLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(log: &DetectionLog, source_id: u64, content: &str) -> DetectionEntry {
        log.push(
            source_id,
            "S",
            None,
            0.5,
            DetectionMethod::NameMatch,
            content,
            Utc::now(),
        )
    }

    #[test]
    fn capped_and_newest_first() {
        let log = DetectionLog::with_capacity(3);
        for i in 0..5 {
            push(&log, i % 2, &format!("c{i}"));
        }
        assert_eq!(log.len(), 3);
        let all: Vec<String> = log
            .recent(None, 10)
            .into_iter()
            .map(|e| e.detected_content)
            .collect();
        assert_eq!(all, vec!["c4", "c3", "c2"]);

        let only_odd = log.recent(Some(1), 10);
        assert_eq!(only_odd.len(), 1);
        assert_eq!(only_odd[0].detected_content, "c3");
    }

    #[test]
    fn content_is_truncated() {
        let log = DetectionLog::default();
        let e = push(&log, 1, &"x".repeat(900));
        assert_eq!(e.detected_content.chars().count(), DETECTED_CONTENT_MAX_CHARS);
    }

    #[test]
    fn purge_removes_one_source() {
        let log = DetectionLog::default();
        push(&log, 1, "a");
        push(&log, 2, "b");
        push(&log, 1, "c");
        assert_eq!(log.purge_source(1), 2);
        assert_eq!(log.len(), 1);
    }
}
