// src/store.rs
//! In-memory source repository plus the detection log.
//!
//! The table is guarded by an `RwLock`; detection works on `snapshot()`, a cloned,
//! name-ordered `Vec<Source>`, so scoring never holds the lock. The only mutation a
//! detection causes is the explicit `record_detection` call made by the caller.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::detect::DetectionMethod;
use crate::error::SourceError;
use crate::history::{DetectionEntry, DetectionLog, DEFAULT_HISTORY_CAPACITY};
use crate::source::{CategoryRef, Source, SourceDraft, TagRef, DEFAULT_MAX_TAGS};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
const TOP_SOURCES: usize = 10;

#[derive(Debug, Default)]
struct Table {
    sources: BTreeMap<u64, Source>,
    next_id: u64,
}

impl Table {
    fn slug_taken(&self, slug: &str, except: Option<u64>) -> bool {
        self.sources
            .values()
            .any(|s| s.slug == slug && Some(s.id) != except)
    }
}

#[derive(Debug)]
pub struct SourceStore {
    table: RwLock<Table>,
    log: DetectionLog,
    max_tags: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopSource {
    pub name: String,
    pub count: u64,
    pub last_detected: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub total_sources: usize,
    pub total_detections: u64,
    pub avg_detections: f64,
    pub top_sources: Vec<TopSource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingStats {
    pub detection_count: u64,
    pub last_detected: Option<DateTime<Utc>>,
}

/// Flattened per-source view for automation clients.
#[derive(Debug, Clone, Serialize)]
pub struct MappingEntry {
    pub id: u64,
    pub slug: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub category: Option<CategoryRef>,
    pub tags: Vec<TagRef>,
    pub auto_publish: bool,
    pub requires_review: bool,
    pub has_webhook: bool,
    pub stats: MappingStats,
}

impl SourceStore {
    pub fn new(max_tags: usize, history_capacity: usize) -> Self {
        Self {
            table: RwLock::new(Table {
                sources: BTreeMap::new(),
                next_id: 1,
            }),
            log: DetectionLog::with_capacity(history_capacity),
            max_tags,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table> {
        self.table.write().unwrap_or_else(|p| p.into_inner())
    }

    /// All sources, name-ascending (the order detection iterates in).
    pub fn snapshot(&self) -> Vec<Source> {
        let mut v: Vec<Source> = self.read().sources.values().cloned().collect();
        v.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        v
    }

    pub fn list(&self) -> Vec<Source> {
        self.snapshot()
    }

    pub fn len(&self) -> usize {
        self.read().sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: u64) -> Option<Source> {
        self.read().sources.get(&id).cloned()
    }

    pub fn get_by_slug(&self, slug: &str) -> Option<Source> {
        self.read()
            .sources
            .values()
            .find(|s| s.slug == slug)
            .cloned()
    }

    /// Case-insensitive substring search on name, name-ascending.
    pub fn search_by_name(&self, needle: &str) -> Vec<Source> {
        let needle = needle.to_lowercase();
        self.snapshot()
            .into_iter()
            .filter(|s| s.name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn insert(&self, draft: SourceDraft) -> Result<Source, SourceError> {
        let mut t = self.write();
        let id = t.next_id;
        let source = draft.into_source(id, self.max_tags)?;
        if t.slug_taken(&source.slug, None) {
            return Err(SourceError::DuplicateSlug(source.slug));
        }
        t.next_id += 1;
        t.sources.insert(id, source.clone());
        info!(id, slug = %source.slug, "source created");
        Ok(source)
    }

    /// Replace the editable fields of `id`; counters are kept.
    pub fn update(&self, id: u64, draft: SourceDraft) -> Result<Source, SourceError> {
        let mut t = self.write();
        let (count, last) = match t.sources.get(&id) {
            Some(existing) => (existing.detection_count, existing.last_detected_at),
            None => return Err(SourceError::NotFound(id)),
        };
        let mut source = draft.into_source(id, self.max_tags)?;
        if t.slug_taken(&source.slug, Some(id)) {
            return Err(SourceError::DuplicateSlug(source.slug));
        }
        source.detection_count = count;
        source.last_detected_at = last;
        t.sources.insert(id, source.clone());
        info!(id, slug = %source.slug, "source updated");
        Ok(source)
    }

    /// Remove a source and its detection history.
    pub fn delete(&self, id: u64) -> Result<Source, SourceError> {
        let removed = self
            .write()
            .sources
            .remove(&id)
            .ok_or(SourceError::NotFound(id))?;
        let purged = self.log.purge_source(id);
        info!(id, slug = %removed.slug, purged, "source deleted");
        Ok(removed)
    }

    /// Record a detection the caller has accepted: append to the log and bump counters.
    pub fn record_detection(
        &self,
        source_id: u64,
        post_id: Option<u64>,
        confidence: f64,
        method: DetectionMethod,
        content: &str,
    ) -> Result<DetectionEntry, SourceError> {
        let now = Utc::now();
        let name = {
            let mut t = self.write();
            let source = t
                .sources
                .get_mut(&source_id)
                .ok_or(SourceError::NotFound(source_id))?;
            source.detection_count += 1;
            source.last_detected_at = Some(now);
            source.name.clone()
        };
        Ok(self
            .log
            .push(source_id, &name, post_id, confidence, method, content, now))
    }

    pub fn history(&self, source_id: Option<u64>, limit: usize) -> Vec<DetectionEntry> {
        self.log.recent(source_id, limit)
    }

    pub fn stats(&self) -> SourceStats {
        let t = self.read();
        let total_sources = t.sources.len();
        let total_detections: u64 = t.sources.values().map(|s| s.detection_count).sum();
        let avg_detections = if total_sources == 0 {
            0.0
        } else {
            round2(total_detections as f64 / total_sources as f64)
        };

        let mut top_sources: Vec<TopSource> = t
            .sources
            .values()
            .filter(|s| s.detection_count > 0)
            .map(|s| TopSource {
                name: s.name.clone(),
                count: s.detection_count,
                last_detected: s.last_detected_at,
            })
            .collect();
        top_sources.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        top_sources.truncate(TOP_SOURCES);

        SourceStats {
            total_sources,
            total_detections,
            avg_detections,
            top_sources,
        }
    }

    /// Pretty JSON of every source, webhook targets stripped.
    pub fn export(&self) -> Result<String, serde_json::Error> {
        let sources: Vec<Source> = self
            .snapshot()
            .into_iter()
            .map(|mut s| {
                s.webhook_url = None;
                s
            })
            .collect();
        serde_json::to_string_pretty(&sources)
    }

    /// Insert every record whose slug is not present yet. Returns how many were added.
    /// Individual records that fail validation are skipped.
    pub fn import(&self, json: &str) -> Result<usize, SourceError> {
        let v: Value =
            serde_json::from_str(json).map_err(|e| SourceError::InvalidImport(e.to_string()))?;
        let items = match v {
            Value::Array(items) => items,
            _ => return Err(SourceError::InvalidImport("expected a JSON array".into())),
        };

        let mut imported = 0usize;
        for item in items {
            let draft: SourceDraft = match serde_json::from_value(item) {
                Ok(d) => d,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable source in import");
                    continue;
                }
            };
            match self.insert(draft) {
                Ok(_) => imported += 1,
                Err(SourceError::DuplicateSlug(slug)) => {
                    tracing::debug!(%slug, "import: slug exists, skipped");
                }
                Err(e) => warn!(error = %e, "skipping invalid source in import"),
            }
        }
        info!(imported, "sources imported");
        Ok(imported)
    }

    /// name -> flattened entry.
    pub fn mapping(&self) -> BTreeMap<String, MappingEntry> {
        self.snapshot()
            .into_iter()
            .map(|s| {
                let entry = MappingEntry {
                    id: s.id,
                    has_webhook: s.has_webhook(),
                    slug: s.slug,
                    source_type: s.source_type,
                    description: s.description,
                    keywords: s.keywords,
                    category: s.category,
                    tags: s.tags,
                    auto_publish: s.auto_publish,
                    requires_review: s.requires_review,
                    stats: MappingStats {
                        detection_count: s.detection_count,
                        last_detected: s.last_detected_at,
                    },
                };
                (s.name, entry)
            })
            .collect()
    }
}

impl Default for SourceStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TAGS, DEFAULT_HISTORY_CAPACITY)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::detect_intelligent;
    use serde_json::json;

    fn draft(v: Value) -> SourceDraft {
        serde_json::from_value(v).unwrap()
    }

    fn seeded() -> SourceStore {
        let store = SourceStore::default();
        store
            .insert(draft(json!({"name": "Water Board", "keywords": "reservoir, pipeline"})))
            .unwrap();
        store
            .insert(draft(json!({"name": "Alcaldía Central", "keywords": ["obras"]})))
            .unwrap();
        store
    }

    #[test]
    fn snapshot_is_name_ordered() {
        let store = seeded();
        let names: Vec<String> = store.snapshot().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Alcaldía Central", "Water Board"]);
    }

    #[test]
    fn slug_is_unique_across_insert_and_update() {
        let store = seeded();
        let err = store
            .insert(SourceDraft::named("WATER board!"))
            .unwrap_err();
        assert!(matches!(err, SourceError::DuplicateSlug(ref s) if s == "water-board"));

        let alc = store.get_by_slug("alcaldia-central").unwrap();
        let err = store
            .update(alc.id, SourceDraft::named("Water Board"))
            .unwrap_err();
        assert!(matches!(err, SourceError::DuplicateSlug(_)));

        // Renaming onto its own slug is fine.
        assert!(store
            .update(alc.id, SourceDraft::named("Alcaldia Central"))
            .is_ok());
    }

    #[test]
    fn invalid_rules_are_rejected_at_write_time() {
        let store = SourceStore::default();
        let err = store
            .insert(draft(json!({"name": "X", "detection_rules": "[{\"type\""})))
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidRules(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn detection_is_pure_and_recording_is_explicit() {
        let store = seeded();
        let snap = store.snapshot();
        let d = detect_intelligent("Water Board reservoir notice", &snap, 30).unwrap();
        assert_eq!(store.get(d.source.id).unwrap().detection_count, 0);

        let entry = store
            .record_detection(d.source.id, None, d.confidence, d.method, "Water Board reservoir notice")
            .unwrap();
        assert_eq!(entry.source_name, "Water Board");

        let s = store.get(d.source.id).unwrap();
        assert_eq!(s.detection_count, 1);
        assert!(s.last_detected_at.is_some());
        assert_eq!(store.history(Some(s.id), 10).len(), 1);
    }

    #[test]
    fn update_keeps_counters() {
        let store = seeded();
        let id = store.get_by_slug("water-board").unwrap().id;
        store
            .record_detection(id, Some(7), 0.9, DetectionMethod::NameMatch, "x")
            .unwrap();
        let s = store
            .update(id, draft(json!({"name": "Water Board", "keywords": "dam"})))
            .unwrap();
        assert_eq!(s.detection_count, 1);
        assert_eq!(s.keywords, vec!["dam"]);
    }

    #[test]
    fn delete_purges_history() {
        let store = seeded();
        let id = store.get_by_slug("water-board").unwrap().id;
        store
            .record_detection(id, None, 0.5, DetectionMethod::KeywordMatch, "x")
            .unwrap();
        store.delete(id).unwrap();
        assert!(store.history(None, 10).is_empty());
        assert!(matches!(store.delete(id), Err(SourceError::NotFound(_))));
    }

    #[test]
    fn stats_and_top_sources() {
        let store = seeded();
        let wb = store.get_by_slug("water-board").unwrap().id;
        for _ in 0..3 {
            store
                .record_detection(wb, None, 0.5, DetectionMethod::NameMatch, "x")
                .unwrap();
        }
        let st = store.stats();
        assert_eq!(st.total_sources, 2);
        assert_eq!(st.total_detections, 3);
        assert_eq!(st.avg_detections, 1.5);
        assert_eq!(st.top_sources.len(), 1);
        assert_eq!(st.top_sources[0].name, "Water Board");
    }

    #[test]
    fn export_import_round_trip_skips_existing_slugs() {
        let store = seeded();
        let mut d = SourceDraft::named("Port Authority");
        d.webhook_url = Some("https://hooks.example/port".into());
        d.detection_rules = Some(json!([{"type": "contains", "value": "berth", "weight": 30}]));
        store.insert(d).unwrap();

        let dump = store.export().unwrap();
        assert!(!dump.contains("hooks.example"));

        let fresh = SourceStore::default();
        assert_eq!(fresh.import(&dump).unwrap(), 3);
        assert_eq!(fresh.import(&dump).unwrap(), 0);

        let port = fresh.get_by_slug("port-authority").unwrap();
        let orig = store.get_by_slug("port-authority").unwrap();
        assert_eq!(port.detection_rules, orig.detection_rules);
    }

    #[test]
    fn import_rejects_non_arrays() {
        let store = SourceStore::default();
        assert!(matches!(
            store.import(r#"{"name":"x"}"#),
            Err(SourceError::InvalidImport(_))
        ));
        assert!(matches!(store.import("nope"), Err(SourceError::InvalidImport(_))));
    }

    #[test]
    fn search_and_mapping() {
        let store = seeded();
        assert_eq!(store.search_by_name("BOARD").len(), 1);
        let m = store.mapping();
        assert_eq!(m["Water Board"].keywords, vec!["reservoir", "pipeline"]);
        assert!(!m["Water Board"].has_webhook);
    }
}
