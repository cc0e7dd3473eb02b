use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

static ASIN_RE: OnceLock<Regex> = OnceLock::new();
static ISBN10_RE: OnceLock<Regex> = OnceLock::new();
static ISBN13_RE: OnceLock<Regex> = OnceLock::new();

fn asin_re() -> &'static Regex {
    ASIN_RE.get_or_init(|| Regex::new(r"^B[A-Z0-9]{9}$").expect("static ASIN pattern"))
}

fn isbn10_re() -> &'static Regex {
    ISBN10_RE.get_or_init(|| Regex::new(r"^\d{9}[\dX]$").expect("static ISBN-10 pattern"))
}

fn isbn13_re() -> &'static Regex {
    ISBN13_RE.get_or_init(|| Regex::new(r"^97[89]\d{10}$").expect("static ISBN-13 pattern"))
}

/// Broad identifier family a scanned/typed code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CodeType {
    Isbn,
    Upc,
    Asin,
    Unknown,
}

impl CodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeType::Isbn => "ISBN",
            CodeType::Upc => "UPC",
            CodeType::Asin => "ASIN",
            CodeType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of cleaning and classifying a raw code.
///
/// `search_code` is what providers receive and what the result cache is keyed
/// on. It is always uppercase ASCII alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCode {
    raw: String,
    #[serde(rename = "type")]
    code_type: CodeType,
    search_code: String,
    was_converted: bool,
    requires_search: bool,
}

impl NormalizedCode {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn code_type(&self) -> CodeType {
        self.code_type
    }

    pub fn search_code(&self) -> &str {
        &self.search_code
    }

    pub fn was_converted(&self) -> bool {
        self.was_converted
    }

    pub fn requires_search(&self) -> bool {
        self.requires_search
    }

    pub fn is_unknown(&self) -> bool {
        self.code_type == CodeType::Unknown
    }

    /// Cache key: post-normalization code, qualified by type.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.code_type, self.search_code)
    }
}

/// Strip separators/whitespace, uppercase, and classify.
///
/// Rules are evaluated in order, first match wins:
/// ASIN (`B` + 9), ISBN-10, 978/979 ISBN-13, UPC-12, UPC-8, otherwise unknown.
pub fn normalize(raw: &str) -> NormalizedCode {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let classified = |code_type, search_code: String, was_converted, requires_search| {
        NormalizedCode {
            raw: raw.to_string(),
            code_type,
            search_code,
            was_converted,
            requires_search,
        }
    };

    match cleaned.len() {
        10 if asin_re().is_match(&cleaned) => classified(CodeType::Asin, cleaned, false, false),
        10 if isbn10_re().is_match(&cleaned) => classified(CodeType::Isbn, cleaned, false, false),
        13 if isbn13_re().is_match(&cleaned) => match isbn13_to_isbn10(&cleaned) {
            Some(isbn10) => classified(CodeType::Isbn, isbn10, true, false),
            // 979 has no ISBN-10 form; keep the 13 digits and resolve via search.
            None => classified(CodeType::Isbn, cleaned, false, true),
        },
        12 | 8 if is_all_digits(&cleaned) => classified(CodeType::Upc, cleaned, false, true),
        _ => classified(CodeType::Unknown, cleaned, false, false),
    }
}

/// Convert a 978-prefixed ISBN-13 to its ISBN-10 form.
///
/// Returns `None` for anything that is not exactly 13 digits with the 978
/// prefix once non-digits are removed; 979 codes are never converted.
pub fn isbn13_to_isbn10(isbn13: &str) -> Option<String> {
    let digits: Vec<u32> = isbn13.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 13 || digits[..3] != [9, 7, 8] {
        return None;
    }

    let base = &digits[3..12];
    let sum: u32 = base
        .iter()
        .enumerate()
        .map(|(i, d)| d * (10 - i as u32))
        .sum();
    let check = (11 - (sum % 11)) % 11;

    let mut out: String = base
        .iter()
        .filter_map(|d| char::from_digit(*d, 10))
        .collect();
    out.push(if check == 10 {
        'X'
    } else {
        char::from_digit(check, 10)?
    });
    Some(out)
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
