// src/notify/mod.rs
//! Outbound notification when a source is detected.

pub mod webhook;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

use crate::source::{CategoryRef, Source, TagRef};

pub use webhook::WebhookNotifier;

pub const EVENT_SOURCE_DETECTED: &str = "source_detected";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSource {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub category: Option<CategoryRef>,
    pub tags: Vec<TagRef>,
    pub auto_publish: bool,
    pub requires_review: bool,
}

/// Body posted to a source's webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionEvent {
    pub event: &'static str,
    pub source: EventSource,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl DetectionEvent {
    pub fn source_detected(source: &Source, confidence: f64, at: DateTime<Utc>) -> Self {
        Self {
            event: EVENT_SOURCE_DETECTED,
            source: EventSource {
                id: source.id,
                name: source.name.clone(),
                slug: source.slug.clone(),
                category: source.category.clone(),
                tags: source.tags.clone(),
                auto_publish: source.auto_publish,
                requires_review: source.requires_review,
            },
            confidence,
            timestamp: at,
        }
    }
}

#[async_trait]
pub trait DetectionNotifier: Send + Sync {
    async fn notify(&self, url: &str, event: &DetectionEvent) -> Result<()>;
}

/// Drops every event (webhooks disabled).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl DetectionNotifier for NoopNotifier {
    async fn notify(&self, _url: &str, _event: &DetectionEvent) -> Result<()> {
        Ok(())
    }
}

/// Keeps `(url, event)` pairs in memory; used by tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, DetectionEvent)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, DetectionEvent)> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl DetectionNotifier for RecordingNotifier {
    async fn notify(&self, url: &str, event: &DetectionEvent) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((url.to_string(), event.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_notifier_keeps_events() {
        let s = Source::new(3, "Port Authority");
        let ev = DetectionEvent::source_detected(&s, 0.65, Utc::now());
        let rec = RecordingNotifier::default();
        rec.notify("https://hooks.example/port", &ev).await.unwrap();

        let sent = rec.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "https://hooks.example/port");
        assert_eq!(sent[0].1.source.slug, "port-authority");
    }

    #[test]
    fn event_shape() {
        let mut s = Source::new(3, "Port Authority").with_category(7, "Harbor");
        s.tags = vec![TagRef {
            id: 21,
            name: "shipping".into(),
        }];
        s.auto_publish = true;
        let v = serde_json::to_value(DetectionEvent::source_detected(&s, 0.5, Utc::now())).unwrap();
        assert_eq!(v["event"], "source_detected");
        assert_eq!(v["source"]["id"], 3);
        assert_eq!(v["source"]["category"]["id"], 7);
        assert_eq!(v["source"]["category"]["name"], "Harbor");
        assert_eq!(v["source"]["tags"][0]["name"], "shipping");
        assert_eq!(v["source"]["auto_publish"], true);
        assert_eq!(v["source"]["requires_review"], true);
        assert_eq!(v["confidence"], 0.5);
        assert!(v["timestamp"].is_string());
    }
}
