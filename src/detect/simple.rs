// src/detect/simple.rs
//! Reduced ladder used by the HTTP `detect` endpoint.
//!
//! 1. First source (iteration order) whose name appears -> confidence 1.0.
//! 2. Otherwise keyword fraction per source; fraction >= 0.3 qualifies with
//!    `min(0.9, 0.3 + fraction * 0.6)`. Scanning stops at the first qualifying
//!    confidence >= 0.8; below that a later qualifying source replaces an earlier one.
//!
//! Step 2 is last-wins, not best-of. Existing callers see that behaviour; keep it
//! until someone decides otherwise.

use super::{Detection, DetectionMethod, DetectionMode, DetectionStrategy};
use crate::source::Source;
use crate::text::Haystack;

pub const MIN_KEYWORD_FRACTION: f64 = 0.3;
pub const KEYWORD_BASE: f64 = 0.3;
pub const KEYWORD_SPAN: f64 = 0.6;
pub const KEYWORD_CAP: f64 = 0.9;
pub const KEYWORD_SHORT_CIRCUIT: f64 = 0.8;

#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleStrategy;

impl DetectionStrategy for SimpleStrategy {
    fn mode(&self) -> DetectionMode {
        DetectionMode::Simple
    }

    fn detect<'a>(&self, content: &str, sources: &'a [Source]) -> Option<Detection<'a>> {
        detect_simple(content, sources)
    }
}

/// Fraction of `source`'s keywords found in `hay`. `None` when it has no keywords.
pub fn keyword_fraction(hay: &Haystack<'_>, source: &Source) -> Option<f64> {
    let total = source
        .keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .count();
    if total == 0 {
        return None;
    }
    let found = source
        .keywords
        .iter()
        .filter(|k| hay.contains(k.trim()))
        .count();
    Some(found as f64 / total as f64)
}

pub fn detect_simple<'a>(content: &str, sources: &'a [Source]) -> Option<Detection<'a>> {
    let hay = Haystack::new(content);
    if hay.is_blank() {
        return None;
    }

    if let Some(source) = sources.iter().find(|s| hay.contains(s.name.trim())) {
        return Some(Detection {
            source,
            confidence: 1.0,
            raw_score: 1.0,
            method: DetectionMethod::NameMatch,
            breakdown: None,
        });
    }

    let mut found: Option<Detection<'a>> = None;
    for source in sources {
        let Some(fraction) = keyword_fraction(&hay, source) else {
            continue;
        };
        if fraction < MIN_KEYWORD_FRACTION {
            continue;
        }
        let confidence = (KEYWORD_BASE + fraction * KEYWORD_SPAN).min(KEYWORD_CAP);
        found = Some(Detection {
            source,
            confidence,
            raw_score: fraction,
            method: DetectionMethod::KeywordMatch,
            breakdown: None,
        });
        if confidence >= KEYWORD_SHORT_CIRCUIT {
            break;
        }
    }
    found
}
