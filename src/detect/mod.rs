// src/detect/mod.rs
//! Source detection: given content and a snapshot of sources, pick the originator.
//!
//! Two strategies with different numeric scales live side by side:
//! - `intelligent`: additive points (name 50, keyword 20, phrase 15, rule weight),
//!   normalized by 100, gated by a raw-point threshold.
//! - `simple`: name match (confidence 1.0) or keyword fraction (0.3..=0.9).
//!
//! Detection is pure: it never touches counters or the log. Callers record
//! the outcome through `SourceStore::record_detection`.

pub mod intelligent;
pub mod phrases;
pub mod simple;

use crate::source::Source;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use intelligent::{detect_intelligent, score_source, IntelligentStrategy};
pub use simple::{detect_simple, SimpleStrategy};

/// Which rung of the heuristic ladder produced the win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    NameMatch,
    KeywordMatch,
    ContextPhrase,
    RuleMatch,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NameMatch => "name_match",
            Self::KeywordMatch => "keyword_match",
            Self::ContextPhrase => "context_phrase",
            Self::RuleMatch => "rule_match",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points per signal for one source (intelligent strategy).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub name: i64,
    pub keywords: i64,
    pub phrases: i64,
    pub rules: i64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i64 {
        self.name
            .saturating_add(self.keywords)
            .saturating_add(self.phrases)
            .saturating_add(self.rules)
    }

    /// First rung (name, keyword, phrase, rule) that contributed.
    pub fn leading_method(&self) -> Option<DetectionMethod> {
        if self.name != 0 {
            Some(DetectionMethod::NameMatch)
        } else if self.keywords != 0 {
            Some(DetectionMethod::KeywordMatch)
        } else if self.phrases != 0 {
            Some(DetectionMethod::ContextPhrase)
        } else if self.rules != 0 {
            Some(DetectionMethod::RuleMatch)
        } else {
            None
        }
    }
}

/// Outcome of a successful detection. Borrows the winner from the snapshot.
#[derive(Debug, Clone)]
pub struct Detection<'a> {
    pub source: &'a Source,
    /// Normalized to [0, 1].
    pub confidence: f64,
    /// Intelligent: total points. Simple: keyword fraction (1.0 for a name match).
    pub raw_score: f64,
    pub method: DetectionMethod,
    /// Per-signal points, intelligent strategy only.
    pub breakdown: Option<ScoreBreakdown>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    #[default]
    Simple,
    Intelligent,
}

impl DetectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Intelligent => "intelligent",
        }
    }
}

impl FromStr for DetectionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" | "name" => Ok(Self::Simple),
            "intelligent" | "ai" | "ai_context" => Ok(Self::Intelligent),
            other => Err(anyhow::anyhow!("unknown detection mode: {other}")),
        }
    }
}

/// Common interface over both strategies.
pub trait DetectionStrategy: Send + Sync {
    fn mode(&self) -> DetectionMode;

    fn detect<'a>(&self, content: &str, sources: &'a [Source]) -> Option<Detection<'a>>;
}

/// Build the strategy for `mode`. `min_confidence` only affects the intelligent one.
pub fn strategy_for(mode: DetectionMode, min_confidence: i64) -> Box<dyn DetectionStrategy> {
    match mode {
        DetectionMode::Simple => Box::new(SimpleStrategy),
        DetectionMode::Intelligent => Box::new(IntelligentStrategy::new(min_confidence)),
    }
}
