// src/text.rs
//! Text primitives shared by the detector, rules and validation:
//! a lowercased haystack, word counting and slug derivation.

/// Content prepared once per detection call: the raw text plus its lowercase form.
#[derive(Debug, Clone)]
pub struct Haystack<'a> {
    raw: &'a str,
    lower: String,
}

impl<'a> Haystack<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            lower: raw.to_lowercase(),
        }
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// Case-insensitive substring test. An empty needle never matches.
    pub fn contains(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        self.lower.contains(needle.to_lowercase().as_str())
    }

    /// Case-insensitive prefix test. An empty needle never matches.
    pub fn starts_with(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        self.lower.starts_with(needle.to_lowercase().as_str())
    }

    pub fn word_count(&self) -> usize {
        word_count(self.raw)
    }
}

/// Whitespace-delimited word count.
pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Lowercase, ASCII-folded, hyphenated identifier.
/// "Secretaría de Salud" -> "secretaria-de-salud"
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        let folded = fold_char(ch);
        for c in folded.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c);
            } else {
                pending_dash = true;
            }
        }
    }
    out
}

/// Map common Latin accented letters to their ASCII base.
/// Anything else passes through (and is turned into a separator by `slugify`).
fn fold_char(c: char) -> String {
    let s = match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' | 'ā' | 'ą' => "a",
        'é' | 'è' | 'ë' | 'ê' | 'ē' | 'ę' | 'ě' => "e",
        'í' | 'ì' | 'ï' | 'î' | 'ī' => "i",
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' | 'ø' | 'ō' => "o",
        'ú' | 'ù' | 'ü' | 'û' | 'ū' | 'ů' => "u",
        'ý' | 'ÿ' => "y",
        'ñ' | 'ń' | 'ň' => "n",
        'ç' | 'ć' | 'č' => "c",
        'ś' | 'š' => "s",
        'ź' | 'ż' | 'ž' => "z",
        'ř' => "r",
        'ď' => "d",
        'ť' => "t",
        'ł' => "l",
        'ß' => "ss",
        'æ' => "ae",
        'œ' => "oe",
        other => return other.to_string(),
    };
    s.to_string()
}
