// src/validate.rs
//! Pre-publish content check against one source.
//! Warnings are advisory; only a missing `required` rule value makes content invalid.

use crate::source::Source;
use crate::text::Haystack;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_WORDS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Default for Validation {
    fn default() -> Self {
        Self {
            valid: true,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }
}

pub fn validate_content(source: &Source, content: &str, min_words: usize) -> Validation {
    let hay = Haystack::new(content);
    let mut v = Validation::default();

    let words = hay.word_count();
    if words < min_words {
        v.warnings.push(format!(
            "content is too short ({words} words, fewer than {min_words})"
        ));
    }

    if !source.keywords.is_empty() && !source.keywords.iter().any(|k| hay.contains(k)) {
        v.warnings
            .push("none of this source's keywords were found".to_string());
    }

    for value in source
        .detection_rules
        .iter()
        .filter_map(|r| r.required_value())
    {
        if !hay.contains(value) {
            v.errors.push(format!("missing required content: {value}"));
            v.valid = false;
        }
    }

    v
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["lorem"; n].join(" ")
    }

    #[test]
    fn short_content_without_keywords_warns_but_stays_valid() {
        let s = Source::new(1, "Water Board").with_keywords("reservoir, pipeline");
        let v = validate_content(&s, &words(40), DEFAULT_MIN_WORDS);
        assert!(v.valid);
        assert_eq!(v.warnings.len(), 2);
        assert!(v.errors.is_empty());
    }

    #[test]
    fn long_content_with_keyword_is_clean() {
        let s = Source::new(1, "Water Board").with_keywords("reservoir");
        let content = format!("{} reservoir", words(60));
        let v = validate_content(&s, &content, DEFAULT_MIN_WORDS);
        assert_eq!(v, Validation::default());
    }

    #[test]
    fn source_without_keywords_skips_keyword_warning() {
        let s = Source::new(1, "Water Board");
        let v = validate_content(&s, &words(60), DEFAULT_MIN_WORDS);
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn missing_required_value_invalidates() {
        let s = Source::new(1, "Water Board").with_rules(
            r#"[{"type":"required","value":"Signed,"},{"type":"required","value":"press office"},{"type":"contains","value":"zzz"}]"#,
        );
        let content = format!("{} PRESS OFFICE", words(60));
        let v = validate_content(&s, &content, DEFAULT_MIN_WORDS);
        assert!(!v.valid);
        assert_eq!(v.errors, vec!["missing required content: Signed,".to_string()]);
    }

    #[test]
    fn corrupt_rules_do_not_fail_validation() {
        let s = Source::new(1, "Water Board").with_rules("{{");
        let v = validate_content(&s, &words(60), DEFAULT_MIN_WORDS);
        assert!(v.valid);
    }
}
