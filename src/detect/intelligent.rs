// src/detect/intelligent.rs
//! Additive point scorer.
//!
//! Per source: +50 if the name appears, +20 per keyword found, +15 per description
//! phrase found, +weight per matching rule. The strictly highest total wins (first seen
//! on ties); it is reported when `total >= min_confidence` with
//! `confidence = min(total / 100, 1.0)`.
//!
//! These numbers are the scale operators tune `min_confidence` against. Don't touch them
//! without a migration story.

use super::phrases::extract_key_phrases;
use super::{Detection, DetectionMode, DetectionStrategy, ScoreBreakdown};
use crate::source::Source;
use crate::text::Haystack;

pub const NAME_POINTS: i64 = 50;
pub const KEYWORD_POINTS: i64 = 20;
pub const PHRASE_POINTS: i64 = 15;
pub const NORMALIZATION: f64 = 100.0;
pub const DEFAULT_MIN_CONFIDENCE: i64 = 30;

#[derive(Debug, Clone, Copy)]
pub struct IntelligentStrategy {
    /// Threshold in raw points (inclusive), not normalized confidence.
    pub min_confidence: i64,
}

impl IntelligentStrategy {
    pub fn new(min_confidence: i64) -> Self {
        Self { min_confidence }
    }
}

impl Default for IntelligentStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

impl DetectionStrategy for IntelligentStrategy {
    fn mode(&self) -> DetectionMode {
        DetectionMode::Intelligent
    }

    fn detect<'a>(&self, content: &str, sources: &'a [Source]) -> Option<Detection<'a>> {
        detect_intelligent(content, sources, self.min_confidence)
    }
}

/// Score a single source against prepared content.
pub fn score_source(hay: &Haystack<'_>, source: &Source) -> ScoreBreakdown {
    let name = if hay.contains(source.name.trim()) {
        NAME_POINTS
    } else {
        0
    };

    let keywords = source
        .keywords
        .iter()
        .filter(|k| hay.contains(k.trim()))
        .count() as i64;
    let keywords = keywords.saturating_mul(KEYWORD_POINTS);

    let phrases = if source.description.is_empty() {
        0
    } else {
        let found = extract_key_phrases(&source.description)
            .iter()
            .filter(|p| hay.contains(p))
            .count() as i64;
        found.saturating_mul(PHRASE_POINTS)
    };

    let rules = source.detection_rules.score(hay);

    ScoreBreakdown {
        name,
        keywords,
        phrases,
        rules,
    }
}

/// Run the point scorer over `sources`. `None` when nothing reaches `min_confidence`.
pub fn detect_intelligent<'a>(
    content: &str,
    sources: &'a [Source],
    min_confidence: i64,
) -> Option<Detection<'a>> {
    let hay = Haystack::new(content);
    if hay.is_blank() || sources.is_empty() {
        return None;
    }

    let mut best: Option<(&'a Source, ScoreBreakdown)> = None;
    let mut best_score: i64 = 0;

    for source in sources {
        let breakdown = score_source(&hay, source);
        let score = breakdown.total();
        tracing::trace!(source = %source.slug, score, "intelligent score");
        if score > best_score {
            best_score = score;
            best = Some((source, breakdown));
        }
    }

    let (source, breakdown) = best?;
    if best_score < min_confidence {
        return None;
    }

    let method = breakdown.leading_method()?;
    Some(Detection {
        source,
        confidence: (best_score as f64 / NORMALIZATION).min(1.0),
        raw_score: best_score as f64,
        method,
        breakdown: Some(breakdown),
    })
}
