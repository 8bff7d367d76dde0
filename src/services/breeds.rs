// src/services/breeds.rs

//! Breed matching against the per-source reference mapping.

use crate::models::Source;
use crate::reference::BreedMapping;

/// Maps free-text breeds onto canonical breed identifiers.
///
/// Matching is exact on the whole (trimmed, lower-cased) string. Fuzzy
/// matching belongs to query time, not ingestion.
pub struct BreedMatcher<'a> {
    mapping: &'a BreedMapping,
}

impl<'a> BreedMatcher<'a> {
    pub fn new(mapping: &'a BreedMapping) -> Self {
        Self { mapping }
    }

    /// Canonical breed id for `breed`, if the source's table knows it.
    pub fn match_breed(&self, breed: &str, source: Source) -> Option<String> {
        let key = breed.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }

        let matched = self.mapping.get(source, &key).map(str::to_string);
        if matched.is_none() {
            log::debug!("No breed mapping for '{}' ({})", key, source);
        }
        matched
    }
}
