// src/detect/phrases.rs
//! Contextual phrases pulled out of a source description:
//! anything in double quotes, and the text of `- ` bullet lines.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("quoted regex"));
static RE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*- (.+)$").expect("bullet regex"));

/// Extract phrases in order of first appearance (quoted first, then bullets), deduplicated.
pub fn extract_key_phrases(description: &str) -> Vec<String> {
    let quoted = RE_QUOTED
        .captures_iter(description)
        .filter_map(|c| c.get(1).map(|m| m.as_str()));
    let bullets = RE_BULLET
        .captures_iter(description)
        .filter_map(|c| c.get(1).map(|m| m.as_str()));

    let mut out: Vec<String> = Vec::new();
    for phrase in quoted.chain(bullets) {
        let p = phrase.trim();
        if p.is_empty() || out.iter().any(|seen| seen == p) {
            continue;
        }
        out.push(p.to_string());
    }
    out
}
