// src/reference.rs

//! Reference tables loaded once at startup.
//!
//! Both tables are read-only after construction and are passed by reference
//! into the normalization services. A missing or malformed file is fatal:
//! every later step depends on them.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{PathsConfig, Source};

/// Known words of the source language, stored lower-cased.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    words: HashSet<String>,
}

impl Vocabulary {
    /// Load a word list with one word per line. Blank lines are skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| AppError::reference(path, e))?;
        let vocabulary = Self::from_words(content.lines());
        if vocabulary.is_empty() {
            return Err(AppError::reference(path, "vocabulary is empty"));
        }
        Ok(vocabulary)
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    /// Case-sensitive lookup; callers pass a lower-cased word.
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct MappingEntry {
    #[serde(default)]
    matched_breed: Option<String>,
}

/// Raw breed text → canonical breed id, per source.
#[derive(Debug, Clone, Default)]
pub struct BreedMapping {
    by_source: HashMap<Source, HashMap<String, String>>,
}

impl BreedMapping {
    /// Load the mapping table.
    ///
    /// Expected layout:
    ///
    /// ```json
    /// { "spa": { "berger allemand": { "matched_breed": "German Shepherd Dog" } } }
    /// ```
    ///
    /// Entries whose `matched_breed` is null are dropped. Sources absent from
    /// the file get an empty table.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| AppError::reference(path, e))?;
        Self::from_json(&content).map_err(|e| AppError::reference(path, e))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: HashMap<String, HashMap<String, MappingEntry>> = serde_json::from_str(content)?;

        let mut mapping = Self::default();
        for source in Source::ALL {
            let Some(entries) = raw.get(source.mapping_key()) else {
                log::warn!("Breed mapping has no table for {}", source);
                continue;
            };
            for (breed, entry) in entries {
                if let Some(matched) = &entry.matched_breed {
                    mapping.insert(source, breed, matched);
                }
            }
        }
        Ok(mapping)
    }

    /// Add one entry; the key is stored trimmed and lower-cased.
    pub fn insert(&mut self, source: Source, breed: &str, matched: &str) {
        self.by_source
            .entry(source)
            .or_default()
            .insert(breed.trim().to_lowercase(), matched.to_string());
    }

    /// Exact lookup of an already normalized key.
    pub fn get(&self, source: Source, key: &str) -> Option<&str> {
        self.by_source
            .get(&source)
            .and_then(|table| table.get(key))
            .map(String::as_str)
    }

    pub fn len(&self, source: Source) -> usize {
        self.by_source.get(&source).map_or(0, HashMap::len)
    }
}

/// All reference tables needed by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub vocabulary: Vocabulary,
    pub breeds: BreedMapping,
}

impl ReferenceData {
    pub fn new(vocabulary: Vocabulary, breeds: BreedMapping) -> Self {
        Self { vocabulary, breeds }
    }

    /// Load both tables from the configured paths.
    pub fn load(paths: &PathsConfig) -> Result<Self> {
        let vocabulary = Vocabulary::load(&paths.vocabulary)?;
        let breeds = BreedMapping::load(&paths.breed_mapping)?;

        log::info!(
            "Loaded {} vocabulary words, {} + {} breed mappings",
            vocabulary.len(),
            breeds.len(Source::SecondeChance),
            breeds.len(Source::Spa)
        );

        Ok(Self { vocabulary, breeds })
    }
}
