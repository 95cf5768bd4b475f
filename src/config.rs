// src/config.rs
//! Service configuration from `config/detector.toml` (or `$NEWS_SOURCE_CONFIG_PATH`),
//! with a couple of env overrides. A missing file means defaults.
//!
//! ```toml
//! [detection]
//! min_confidence = 30          # raw points, intelligent strategy
//! default_mode = "simple"      # or "intelligent"
//!
//! [validation]
//! min_words = 50
//!
//! [sources]
//! max_tags = 3
//! seed_path = "config/sources.json"
//! history_capacity = 2000
//!
//! [api]
//! require_api_key = false
//! api_key = ""                 # or $NEWS_SOURCE_API_KEY
//!
//! [webhook]
//! enabled = true
//! timeout_secs = 10
//! max_retries = 3              # clamped to 1..=8
//! inbound_secret = ""          # or $NEWS_SOURCE_WEBHOOK_SECRET
//! ```

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::detect::intelligent::DEFAULT_MIN_CONFIDENCE;
use crate::detect::DetectionMode;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::notify::webhook::MAX_RETRIES;
use crate::source::{Source, DEFAULT_MAX_TAGS};
use crate::validate::DEFAULT_MIN_WORDS;

pub const DEFAULT_CONFIG_PATH: &str = "config/detector.toml";
pub const DEFAULT_SEED_PATH: &str = "config/sources.json";

pub const ENV_CONFIG_PATH: &str = "NEWS_SOURCE_CONFIG_PATH";
pub const ENV_MIN_CONFIDENCE: &str = "NEWS_SOURCE_MIN_CONFIDENCE";
pub const ENV_API_KEY: &str = "NEWS_SOURCE_API_KEY";
pub const ENV_WEBHOOK_SECRET: &str = "NEWS_SOURCE_WEBHOOK_SECRET";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub detection: DetectionSection,
    pub validation: ValidationSection,
    pub sources: SourcesSection,
    pub api: ApiSection,
    pub webhook: WebhookSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionSection {
    pub min_confidence: i64,
    pub default_mode: DetectionMode,
}

impl Default for DetectionSection {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            default_mode: DetectionMode::Simple,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    pub min_words: usize,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            min_words: DEFAULT_MIN_WORDS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesSection {
    pub max_tags: usize,
    pub seed_path: Option<PathBuf>,
    pub history_capacity: usize,
}

impl Default for SourcesSection {
    fn default() -> Self {
        Self {
            max_tags: DEFAULT_MAX_TAGS,
            seed_path: Some(PathBuf::from(DEFAULT_SEED_PATH)),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub require_api_key: bool,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookSection {
    pub enabled: bool,
    pub timeout_secs: u64,
    pub max_retries: u8,
    /// Expected `X-Webhook-Secret` on inbound `/webhook/{id}` calls. Empty: no check.
    pub inbound_secret: String,
}

impl Default for WebhookSection {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 10,
            max_retries: 3,
            inbound_secret: String::new(),
        }
    }
}

impl DetectorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: DetectorConfig = toml::from_str(s).context("parsing detector config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading detector config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Resolve the path from `$NEWS_SOURCE_CONFIG_PATH` or the default, then apply env
    /// overrides. An explicit env path that doesn't exist is an error; a missing default
    /// file is not.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!(
                        "{ENV_CONFIG_PATH} points to non-existent path {}",
                        pb.display()
                    ));
                }
                Self::load_from(&pb)?
            }
            Err(_) => {
                let pb = PathBuf::from(DEFAULT_CONFIG_PATH);
                if pb.exists() {
                    Self::load_from(&pb)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env(
            std::env::var(ENV_MIN_CONFIDENCE).ok(),
            std::env::var(ENV_API_KEY).ok(),
            std::env::var(ENV_WEBHOOK_SECRET).ok(),
        );
        Ok(cfg)
    }

    fn apply_env(
        &mut self,
        min_confidence: Option<String>,
        api_key: Option<String>,
        webhook_secret: Option<String>,
    ) {
        if let Some(v) = min_confidence.and_then(|s| s.trim().parse::<i64>().ok()) {
            self.detection.min_confidence = v.max(0);
        }
        if let Some(k) = api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
            self.api.api_key = k;
        }
        if let Some(s) = webhook_secret
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
        {
            self.webhook.inbound_secret = s;
        }
    }

    fn sanitize(&mut self) {
        if self.detection.min_confidence < 0 {
            self.detection.min_confidence = 0;
        }
        if self.webhook.timeout_secs == 0 {
            self.webhook.timeout_secs = WebhookSection::default().timeout_secs;
        }
        self.webhook.max_retries = self.webhook.max_retries.clamp(1, MAX_RETRIES);
        self.sources.history_capacity = self.sources.history_capacity.max(1);
    }
}

/// Read a seed file (JSON array of sources, same shape as an export).
/// Returns the raw text; the store validates it on import.
pub fn load_seed(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading source seed from {}", path.display()))?;
    Ok(Some(raw))
}

/// Parse a seed/export file straight into records (tooling and tests).
pub fn parse_sources(raw: &str) -> Result<Vec<Source>> {
    serde_json::from_str(raw).context("parsing sources JSON")
}
