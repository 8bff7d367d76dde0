// src/services/names.rs

//! Display name cleaning.
//!
//! Shelter listings often carry names like `"Adorable THOR 75015 (réservé)"`.
//! The normalizer keeps the leading alphabetic run, drops known noise
//! suffixes and then uses the vocabulary to separate filler words from the
//! actual given name. It is a best-effort heuristic: when every remaining
//! word is a dictionary word it cannot tell which one is the name, and keeps
//! them all.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use crate::error::{AppError, Result};
use crate::reference::Vocabulary;

/// Leading run of letters, whitespace, hyphens and apostrophes.
static LEADING_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[^\W\d_]|[\s\-'’])+").unwrap());

/// Characters stripped from token edges before the vocabulary lookup.
const EDGE_CHARS: [char; 3] = ['-', '\'', '’'];

/// Heuristic cleaner for raw display names.
pub struct NameNormalizer<'a> {
    vocabulary: &'a Vocabulary,
    noise: Regex,
}

impl<'a> NameNormalizer<'a> {
    /// Build a normalizer. `acronyms` are organisational markers that start a
    /// noise suffix when they appear as a separate word.
    pub fn new(vocabulary: &'a Vocabulary, acronyms: &[String]) -> Result<Self> {
        let mut alternatives = vec![
            r"\s*\(.*".to_string(),
            r"\s*&.*".to_string(),
            r"\s+\w*\d{5}.*".to_string(),
        ];
        if !acronyms.is_empty() {
            let joined = acronyms
                .iter()
                .map(|a| regex::escape(a.trim()))
                .collect::<Vec<_>>()
                .join("|");
            alternatives.push(format!(r"\s+\b(?:{joined})\b.*"));
        }

        let pattern = format!("(?i)(?:{})", alternatives.join("|"));
        let noise = Regex::new(&pattern)
            .map_err(|e| AppError::config(format!("invalid name noise pattern: {e}")))?;

        Ok(Self { vocabulary, noise })
    }

    /// Clean a raw display name. Returns `None` when nothing usable survives.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        if raw.trim().is_empty() {
            return None;
        }

        let decoded = decode_entities(raw);
        let leading = LEADING_NAME.find(&decoded)?.as_str().trim();
        let cleaned = self.noise.replace_all(leading, "");

        let tokens: Vec<&str> = cleaned
            .split_whitespace()
            .filter(|token| token.chars().any(char::is_alphabetic))
            .collect();
        if tokens.is_empty() {
            return None;
        }

        let unknown: Vec<&str> = tokens
            .iter()
            .copied()
            .filter(|token| !self.is_known_word(token))
            .collect();

        let kept = if unknown.is_empty() { tokens } else { unknown };
        Some(title_case(&kept.join(" ")))
    }

    fn is_known_word(&self, token: &str) -> bool {
        let word = token.to_lowercase();
        self.vocabulary.contains(word.trim_matches(EDGE_CHARS.as_slice()))
    }
}

/// Decode HTML entities such as `&rsquo;` or `&#233;`.
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    Html::parse_fragment(raw).root_element().text().collect()
}

/// Upper-case every letter that follows a non-letter, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_is_letter = false;

    for c in s.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}
