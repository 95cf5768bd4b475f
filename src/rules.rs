// src/rules.rs
//! Structured detection rules attached to a source.
//!
//! Stored form is a JSON array of objects, e.g.
//! `[{"type":"contains","value":"boletín","weight":25},{"type":"word_count_min","value":"80"}]`
//!
//! Supported `type`s:
//! - `contains`:       case-insensitive substring of the content
//! - `regex`:          PCRE-delimited pattern (`/.../i`, `#...#`, `{...}`)
//! - `starts_with`:    case-insensitive prefix of the content
//! - `word_count_min`: whitespace word count >= value
//! - `required`:       validation only; never scores during detection
//!
//! Anything else parses to `RuleKind::Unknown` and never matches. Rules missing
//! `type` or `value` are dropped. A matching rule scores `weight` (default 10).
//!
//! The raw JSON is kept verbatim and parsed lazily, once per record. Validation of
//! the JSON happens on write (`DetectionRules::validate`); a corrupt stored value
//! simply yields no rules.

use crate::error::SourceError;
use crate::text::Haystack;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

pub const DEFAULT_RULE_WEIGHT: i64 = 10;

#[derive(Debug, Clone)]
pub struct DetectionRule {
    pub kind: RuleKind,
    pub weight: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    Contains(String),
    Regex(RegexRule),
    StartsWith(String),
    WordCountMin(usize),
    Required(String),
    /// Unrecognised `type`; kept so the rule list mirrors what was stored.
    Unknown { kind: String, value: String },
}

/// A regex rule keeps the authored pattern next to its compiled form.
/// `compiled` is `None` when the pattern is invalid.
#[derive(Debug, Clone)]
pub struct RegexRule {
    pub pattern: String,
    compiled: Option<Regex>,
}

impl PartialEq for RegexRule {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl PartialEq for DetectionRule {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.weight == other.weight
    }
}

impl RegexRule {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let compiled = compile_pattern(&pattern);
        Self { pattern, compiled }
    }

    pub fn is_valid(&self) -> bool {
        self.compiled.is_some()
    }

    fn is_match(&self, text: &str) -> bool {
        self.compiled.as_ref().is_some_and(|re| re.is_match(text))
    }
}

impl DetectionRule {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            weight: DEFAULT_RULE_WEIGHT,
        }
    }

    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = weight;
        self
    }

    /// Does this rule contribute to the detection score for `hay`?
    pub fn matches(&self, hay: &Haystack<'_>) -> bool {
        match &self.kind {
            RuleKind::Contains(v) => hay.contains(v),
            RuleKind::Regex(r) => r.is_match(hay.raw()),
            RuleKind::StartsWith(v) => hay.starts_with(v),
            RuleKind::WordCountMin(min) => hay.word_count() >= *min,
            RuleKind::Required(_) | RuleKind::Unknown { .. } => false,
        }
    }

    /// Value of a `required` rule, if this is one.
    pub fn required_value(&self) -> Option<&str> {
        match &self.kind {
            RuleKind::Required(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match &self.kind {
            RuleKind::Contains(_) => "contains",
            RuleKind::Regex(_) => "regex",
            RuleKind::StartsWith(_) => "starts_with",
            RuleKind::WordCountMin(_) => "word_count_min",
            RuleKind::Required(_) => "required",
            RuleKind::Unknown { kind, .. } => kind.as_str(),
        }
    }

    pub fn value_text(&self) -> String {
        match &self.kind {
            RuleKind::Contains(v) | RuleKind::StartsWith(v) | RuleKind::Required(v) => v.clone(),
            RuleKind::Regex(r) => r.pattern.clone(),
            RuleKind::WordCountMin(n) => n.to_string(),
            RuleKind::Unknown { value, .. } => value.clone(),
        }
    }

    /// Parse one stored rule object. `None` when `type` or `value` is missing.
    fn from_json(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        let kind_name = obj.get("type")?.as_str()?;
        let value = obj.get("value").filter(|v| !v.is_null())?;

        let kind = match kind_name {
            "contains" => RuleKind::Contains(scalar_text(value)?),
            "regex" => RuleKind::Regex(RegexRule::new(scalar_text(value)?)),
            "starts_with" => RuleKind::StartsWith(scalar_text(value)?),
            "word_count_min" => RuleKind::WordCountMin(loose_count(value)),
            "required" => RuleKind::Required(scalar_text(value)?),
            other => RuleKind::Unknown {
                kind: other.to_string(),
                value: scalar_text(value).unwrap_or_default(),
            },
        };

        let weight = obj
            .get("weight")
            .and_then(loose_weight)
            .unwrap_or(DEFAULT_RULE_WEIGHT);

        Some(Self { kind, weight })
    }
}

/// Stored detection rules: raw JSON text plus its lazily parsed form.
#[derive(Debug, Clone, Default)]
pub struct DetectionRules {
    raw: String,
    parsed: OnceCell<Option<Vec<DetectionRule>>>,
}

impl DetectionRules {
    /// Wrap stored text without validating it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            parsed: OnceCell::new(),
        }
    }

    /// Validate and wrap. Used on create/update; the only place bad JSON is an error.
    pub fn parse_strict(raw: &str) -> Result<Self, SourceError> {
        Self::validate(raw)?;
        Ok(Self::from_raw(raw.trim()))
    }

    /// Empty text is fine (no rules). Anything else must be a JSON array.
    pub fn validate(raw: &str) -> Result<(), SourceError> {
        if raw.trim().is_empty() {
            return Ok(());
        }
        let v: Value =
            serde_json::from_str(raw).map_err(|e| SourceError::InvalidRules(e.to_string()))?;
        if !v.is_array() {
            return Err(SourceError::InvalidRules(
                "expected a JSON array of rule objects".into(),
            ));
        }
        Ok(())
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// Parsed rules; `None` when absent or corrupt.
    pub fn rules(&self) -> Option<&[DetectionRule]> {
        self.parsed
            .get_or_init(|| parse_lenient(&self.raw))
            .as_deref()
    }

    /// Iterate parsed rules (empty when absent or corrupt).
    pub fn iter(&self) -> impl Iterator<Item = &DetectionRule> {
        self.rules().unwrap_or(&[]).iter()
    }

    /// Sum of weights of rules matching `hay`.
    pub fn score(&self, hay: &Haystack<'_>) -> i64 {
        self.iter()
            .filter(|r| r.matches(hay))
            .map(|r| r.weight)
            .fold(0i64, i64::saturating_add)
    }

    /// Names (`type:value`) of rules matching `hay`.
    pub fn matched(&self, hay: &Haystack<'_>) -> Vec<String> {
        self.iter()
            .filter(|r| r.matches(hay))
            .map(|r| format!("{}:{}", r.type_name(), r.value_text()))
            .collect()
    }
}

impl PartialEq for DetectionRules {
    fn eq(&self, other: &Self) -> bool {
        self.rules() == other.rules()
    }
}

impl Serialize for DetectionRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_empty() {
            return serializer.serialize_str("");
        }
        match serde_json::from_str::<Value>(&self.raw) {
            Ok(v) => v.serialize(serializer),
            // Corrupt data is passed through untouched rather than dropped.
            Err(_) => serializer.serialize_str(&self.raw),
        }
    }
}

impl<'de> Deserialize<'de> for DetectionRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(deserializer)?;
        Ok(match v {
            Value::Null => Self::default(),
            Value::String(s) => Self::from_raw(s),
            other => Self::from_raw(other.to_string()),
        })
    }
}

fn parse_lenient(raw: &str) -> Option<Vec<DetectionRule>> {
    if raw.trim().is_empty() {
        return None;
    }
    let v: Value = serde_json::from_str(raw).ok()?;
    let items = v.as_array()?;
    Some(items.iter().filter_map(DetectionRule::from_json).collect())
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer coercion for `word_count_min`: numbers, numeric strings; junk -> 0.
fn loose_count(v: &Value) -> usize {
    let n = match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => leading_int(s),
        _ => 0,
    };
    n.max(0) as usize
}

fn loose_weight(v: &Value) -> Option<i64> {
    match v {
        Value::Null => None,
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => Some(
            s.trim()
                .parse::<f64>()
                .map(|f| f as i64)
                .unwrap_or_else(|_| leading_int(s)),
        ),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Leading optional sign + digits, like "120 words" -> 120.
fn leading_int(s: &str) -> i64 {
    let t = s.trim_start();
    let (sign, digits) = match t.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, t.strip_prefix('+').unwrap_or(t)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|n| sign * n).unwrap_or(0)
}

/// Compile a rule pattern written PCRE-style: a delimiter, the body, the closing
/// delimiter and trailing flags (`/fed(eral)?/i`, `#a/b#`, `{foo}i`). Bracket delimiters
/// close with their partner. A pattern without a valid delimiter, with an unsupported
/// flag, or that the `regex` crate can't compile yields `None` and never matches.
fn compile_pattern(pattern: &str) -> Option<Regex> {
    let (body, flags) = split_delimited(pattern)?;

    let mut inline = String::new();
    for f in flags.chars() {
        match f {
            'i' | 'm' | 's' | 'x' | 'U' => {
                if !inline.contains(f) {
                    inline.push(f);
                }
            }
            // Rust regexes are always Unicode-aware; `S` is an optimisation hint.
            'u' | 'S' => {}
            _ => return None,
        }
    }

    let full = if inline.is_empty() {
        body.to_string()
    } else {
        format!("(?{inline}){body}")
    };
    Regex::new(&full).ok()
}

fn closing_delimiter(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '{' => Some('}'),
        '[' => Some(']'),
        '<' => Some('>'),
        c if c.is_alphanumeric() || c == '\\' || c.is_whitespace() => None,
        c => Some(c),
    }
}

fn split_delimited(p: &str) -> Option<(&str, &str)> {
    let p = p.trim_start();
    let open = p.chars().next()?;
    let close = closing_delimiter(open)?;
    let start = open.len_utf8();
    let end = p[start..].rfind(close)? + start;
    let body = &p[start..end];
    let flags = &p[end + close.len_utf8()..];
    if !flags.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((body, flags))
}
