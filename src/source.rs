// src/source.rs
//! Source records and the write-side draft used to create or update them.
//!
//! `SourceDraft` accepts both the structured shape (`category`, `tags`, keyword list)
//! and the flat shape older exports use (`category_id`/`category_name`, comma-joined
//! `tag_ids`/`tag_names`/`keywords`, `"0"`/`"1"` booleans).

use crate::error::SourceError;
use crate::rules::DetectionRules;
use crate::text::slugify;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_SOURCE_TYPE: &str = "general";
pub const DEFAULT_MAX_TAGS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: u64,
    pub name: String,
}

/// A registered content originator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default = "default_source_type", alias = "type")]
    pub source_type: String,
    #[serde(default, deserialize_with = "keyword_list")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub detection_rules: DetectionRules,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    #[serde(default)]
    pub auto_publish: bool,
    #[serde(default = "default_true")]
    pub requires_review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub detection_count: u64,
    #[serde(default)]
    pub last_detected_at: Option<DateTime<Utc>>,
}

impl Source {
    /// Minimal record, handy for tests and seeding.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            slug: slugify(&name),
            name,
            source_type: default_source_type(),
            keywords: Vec::new(),
            description: String::new(),
            detection_rules: DetectionRules::default(),
            category: None,
            tags: Vec::new(),
            auto_publish: false,
            requires_review: true,
            webhook_url: None,
            detection_count: 0,
            last_detected_at: None,
        }
    }

    pub fn with_keywords(mut self, raw: &str) -> Self {
        self.keywords = split_keywords(raw);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach rules without validation (the stored value may be corrupt).
    pub fn with_rules(mut self, raw: impl Into<String>) -> Self {
        self.detection_rules = DetectionRules::from_raw(raw);
        self
    }

    pub fn with_category(mut self, id: u64, name: impl Into<String>) -> Self {
        self.category = Some(CategoryRef {
            id,
            name: name.into(),
        });
        self
    }

    pub fn post_status(&self) -> &'static str {
        if self.auto_publish {
            "publish"
        } else {
            "draft"
        }
    }

    pub fn tag_ids(&self) -> Vec<u64> {
        self.tags.iter().map(|t| t.id).collect()
    }

    pub fn has_webhook(&self) -> bool {
        self.webhook_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty())
    }
}

/// Create/update payload. Everything except `name` is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceDraft {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, alias = "type")]
    pub source_type: Option<String>,
    #[serde(default, deserialize_with = "keyword_list")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub detection_rules: Option<Value>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default, deserialize_with = "loose_opt_u64")]
    pub category_id: Option<u64>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    #[serde(default)]
    pub tag_ids: Option<String>,
    #[serde(default)]
    pub tag_names: Option<String>,
    #[serde(default, deserialize_with = "loose_opt_bool")]
    pub auto_publish: Option<bool>,
    #[serde(default, deserialize_with = "loose_opt_bool")]
    pub requires_review: Option<bool>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl SourceDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Validate and build a record. Counters start at zero; the store carries them
    /// over on update.
    pub fn into_source(self, id: u64, max_tags: usize) -> Result<Source, SourceError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(SourceError::EmptyName);
        }

        let slug_input = self
            .slug
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&name);
        let slug = slugify(slug_input);
        if slug.is_empty() {
            return Err(SourceError::EmptySlug(slug_input.to_string()));
        }

        let detection_rules = match self.detection_rules {
            None | Some(Value::Null) => DetectionRules::default(),
            Some(Value::String(s)) => DetectionRules::parse_strict(&s)?,
            Some(v @ Value::Array(_)) => DetectionRules::from_raw(v.to_string()),
            Some(_) => {
                return Err(SourceError::InvalidRules(
                    "expected a JSON array of rule objects".into(),
                ))
            }
        };

        let category = self.category.or_else(|| {
            self.category_id
                .filter(|id| *id > 0)
                .map(|id| CategoryRef {
                    id,
                    name: self.category_name.clone().unwrap_or_default(),
                })
        });

        let mut tags = if self.tags.is_empty() {
            zip_flat_tags(
                self.tag_ids.as_deref().unwrap_or(""),
                self.tag_names.as_deref().unwrap_or(""),
            )
        } else {
            self.tags
        };
        tags.truncate(max_tags);

        let source_type = self
            .source_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(default_source_type);

        let webhook_url = self
            .webhook_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        Ok(Source {
            id,
            name,
            slug,
            source_type,
            keywords: self.keywords,
            description: self.description.unwrap_or_default(),
            detection_rules,
            category,
            tags,
            auto_publish: self.auto_publish.unwrap_or(false),
            requires_review: self.requires_review.unwrap_or(true),
            webhook_url,
            detection_count: 0,
            last_detected_at: None,
        })
    }
}

/// Split a comma-joined keyword list; entries are trimmed, empties dropped, order kept.
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pair up flat `"3,7"` / `"Salud,Gobierno"` lists. Ids that don't parse are dropped.
fn zip_flat_tags(ids: &str, names: &str) -> Vec<TagRef> {
    let names: Vec<&str> = names.split(',').map(str::trim).collect();
    ids.split(',')
        .enumerate()
        .filter_map(|(i, id)| {
            let id = id.trim().parse::<u64>().ok()?;
            Some(TagRef {
                id,
                name: names.get(i).copied().unwrap_or_default().to_string(),
            })
        })
        .collect()
}

fn default_source_type() -> String {
    DEFAULT_SOURCE_TYPE.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeywordInput {
    Joined(String),
    List(Vec<String>),
}

fn keyword_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<KeywordInput>::deserialize(d)? {
        None => Vec::new(),
        Some(KeywordInput::Joined(s)) => split_keywords(&s),
        Some(KeywordInput::List(v)) => v
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

fn loose_opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "0" | "false" | "no" | "off" => Some(false),
            _ => Some(true),
        },
        _ => None,
    })
}

fn loose_opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn draft_derives_slug_and_defaults() {
        let s = SourceDraft::named("  Secretaría de Salud ")
            .into_source(1, DEFAULT_MAX_TAGS)
            .unwrap();
        assert_eq!(s.name, "Secretaría de Salud");
        assert_eq!(s.slug, "secretaria-de-salud");
        assert_eq!(s.source_type, "general");
        assert!(s.requires_review);
        assert!(!s.auto_publish);
        assert!(s.detection_rules.is_empty());
    }

    #[test]
    fn draft_rejects_empty_name_and_bad_rules() {
        assert!(matches!(
            SourceDraft::named("   ").into_source(1, 3),
            Err(SourceError::EmptyName)
        ));

        let mut d = SourceDraft::named("X");
        d.detection_rules = Some(json!("[{\"type\": }"));
        assert!(matches!(
            d.into_source(1, 3),
            Err(SourceError::InvalidRules(_))
        ));

        let mut d = SourceDraft::named("X");
        d.detection_rules = Some(json!({"type": "contains", "value": "x"}));
        assert!(matches!(
            d.into_source(1, 3),
            Err(SourceError::InvalidRules(_))
        ));
    }

    #[test]
    fn draft_accepts_flat_export_shape() {
        let d: SourceDraft = serde_json::from_value(json!({
            "name": "Ministerio de Economía",
            "slug": "mecon",
            "source_type": "government",
            "keywords": "economía, inflación, ,presupuesto",
            "detection_rules": "[{\"type\":\"contains\",\"value\":\"decreto\"}]",
            "category_id": "12",
            "category_name": "Economía",
            "tag_ids": "3,7,9,11",
            "tag_names": "Gobierno, Finanzas,Política,Extra",
            "auto_publish": "1",
            "requires_review": "0"
        }))
        .unwrap();
        let s = d.into_source(5, 3).unwrap();
        assert_eq!(s.slug, "mecon");
        assert_eq!(s.keywords, vec!["economía", "inflación", "presupuesto"]);
        assert_eq!(
            s.category,
            Some(CategoryRef {
                id: 12,
                name: "Economía".into()
            })
        );
        assert_eq!(s.tag_ids(), vec![3, 7, 9]);
        assert_eq!(s.tags[1].name, "Finanzas");
        assert!(s.auto_publish);
        assert!(!s.requires_review);
        assert_eq!(s.post_status(), "publish");
        assert_eq!(s.detection_rules.rules().map(|r| r.len()), Some(1));
    }

    #[test]
    fn structured_rules_are_accepted() {
        let d: SourceDraft = serde_json::from_value(json!({
            "name": "ACME",
            "keywords": ["widgets", " gadgets "],
            "detection_rules": [{"type": "contains", "value": "acme corp", "weight": 40}]
        }))
        .unwrap();
        let s = d.into_source(1, 3).unwrap();
        assert_eq!(s.keywords, vec!["widgets", "gadgets"]);
        assert_eq!(s.detection_rules.rules().unwrap()[0].weight, 40);
    }

    #[test]
    fn source_serde_round_trip_keeps_rules_field_for_field() {
        let s = Source::new(9, "Springfield Department of Works")
            .with_keywords("roads, bridges")
            .with_rules(r#"[{"type":"regex","value":"/permit \\d+/i","weight":25},{"type":"required","value":"Springfield"}]"#);
        let json = serde_json::to_value(&s).unwrap();
        assert!(json["detection_rules"].is_array());
        let back: Source = serde_json::from_value(json).unwrap();
        assert_eq!(back.detection_rules, s.detection_rules);
        assert_eq!(back.keywords, s.keywords);
        assert_eq!(back.slug, "springfield-department-of-works");
    }

    #[test]
    fn corrupt_stored_rules_still_deserialize() {
        let back: Source = serde_json::from_value(json!({
            "id": 1,
            "name": "X",
            "slug": "x",
            "detection_rules": "[{broken"
        }))
        .unwrap();
        assert!(back.detection_rules.rules().is_none());
        assert_eq!(back.detection_rules.raw(), "[{broken");
    }
}
