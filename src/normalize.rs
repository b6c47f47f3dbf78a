//! Name normalization and comparison keys
//!
//! A raw company name is reduced to lowercase alphanumerics so spelling noise
//! (case, spacing, punctuation) never separates two observations of the same
//! company. The prefix key narrows fuzzy matching to plausible candidates.

use crate::error::{NucleusError, Result};
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NON_SLUG_CHARS: Regex = Regex::new(r"[^\w\s-]").unwrap();
    static ref WHITESPACE_RUNS: Regex = Regex::new(r"\s+").unwrap();
    static ref HYPHEN_RUNS: Regex = Regex::new(r"-+").unwrap();
}

/// Placeholder some sources emit when the company column is blank.
const NOT_AVAILABLE: &str = "N/A";

/// Lowercase the name and drop everything that is not alphanumeric.
///
/// "Tower Research" -> "towerresearch", "Samsung R&D" -> "samsungrd"
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Trim a raw name and reject values that cannot identify a company.
pub fn validate_raw_name(raw: &str) -> Result<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NucleusError::InvalidInput("company name is empty".to_string()));
    }
    if trimmed.eq_ignore_ascii_case(NOT_AVAILABLE) {
        return Err(NucleusError::InvalidInput(format!(
            "company name '{}' is a placeholder",
            trimmed
        )));
    }
    Ok(trimmed)
}

/// Concatenation of the first `words` normalized words of the raw name.
///
/// Falls back to the whole normalized name when the raw name has fewer
/// non-empty words than requested.
pub fn prefix_key(raw: &str, words: usize) -> String {
    let parts: Vec<String> = raw
        .split_whitespace()
        .map(normalize_name)
        .filter(|w| !w.is_empty())
        .collect();

    if words == 0 || parts.len() < words {
        return parts.concat();
    }
    parts.iter().take(words).join("")
}

/// Comparison keys derived once per resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameKey {
    /// Trimmed, un-normalized spelling as observed
    pub raw: String,
    pub normalized: String,
    pub prefix: String,
}

impl NameKey {
    pub fn from_raw(raw: &str, prefix_words: usize) -> Result<Self> {
        let raw = validate_raw_name(raw)?;
        let normalized = normalize_name(raw);
        if normalized.is_empty() {
            return Err(NucleusError::InvalidInput(format!(
                "company name '{}' has no alphanumeric characters",
                raw
            )));
        }
        Ok(Self {
            raw: raw.to_string(),
            prefix: prefix_key(raw, prefix_words),
            normalized,
        })
    }
}

/// LinkedIn-style company slug.
///
/// "Tandemloop Technologies" -> "tandemloop-technologies"
pub fn linkedin_slug(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = NON_SLUG_CHARS.replace_all(&lowered, "");
    let hyphenated = WHITESPACE_RUNS.replace_all(&stripped, "-");
    let collapsed = HYPHEN_RUNS.replace_all(&hyphenated, "-");
    collapsed.trim_matches('-').to_string()
}

pub fn linkedin_company_url(slug: &str) -> String {
    format!("https://www.linkedin.com/company/{}/", slug)
}
