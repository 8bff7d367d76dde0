//! Raw per-listing payloads as handed over by the source collectors.
//!
//! Each source spells its keys differently; the structs below declare the
//! mapping with serde attributes so that the rest of the pipeline only ever
//! sees typed fields.

use serde::{Deserialize, Deserializer};

use crate::error::Result;
use crate::models::Source;

/// Fields extracted from a Seconde Chance HTML detail page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecondeChanceRaw {
    pub url: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub species: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub sex: Option<String>,
    /// Free text such as "2 ans 6 mois"
    #[serde(default, rename = "age text", alias = "age_text", deserialize_with = "optional_text")]
    pub age_text: Option<String>,
    #[serde(default, alias = "breed", deserialize_with = "optional_text")]
    pub race: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub colors: Option<String>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub accepts_dogs: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub accepts_cats: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub accepts_children: Option<bool>,
    #[serde(default, deserialize_with = "optional_text")]
    pub establishment: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub establishment_url: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// Fields taken from the SPA JSON API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpaRaw {
    /// API identifier of the animal, used as the crawl state key when present
    #[serde(default, deserialize_with = "optional_text")]
    pub uid: Option<String>,
    pub url: String,
    #[serde(default, alias = "title", deserialize_with = "optional_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub species: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub sex: Option<String>,
    /// Descriptive birth date such as "Né le 2019-05-04"
    #[serde(default, deserialize_with = "optional_text")]
    pub birthday: Option<String>,
    #[serde(default, alias = "breed", deserialize_with = "optional_text")]
    pub race: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub colors: Option<String>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub accepts_dogs: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub accepts_cats: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub accepts_children: Option<bool>,
    #[serde(default, deserialize_with = "optional_text")]
    pub establishment: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub establishment_url: Option<String>,
    #[serde(default, alias = "image_urls")]
    pub images: Vec<String>,
}

/// A raw listing from one of the supported sources.
#[derive(Debug, Clone)]
pub enum RawListing {
    SecondeChance(SecondeChanceRaw),
    Spa(SpaRaw),
}

impl RawListing {
    /// Parse one JSON line produced by the collector of `source`.
    pub fn from_json(source: Source, line: &str) -> Result<Self> {
        Ok(match source {
            Source::SecondeChance => RawListing::SecondeChance(serde_json::from_str(line)?),
            Source::Spa => RawListing::Spa(serde_json::from_str(line)?),
        })
    }

    pub fn source(&self) -> Source {
        match self {
            RawListing::SecondeChance(_) => Source::SecondeChance,
            RawListing::Spa(_) => Source::Spa,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            RawListing::SecondeChance(raw) => &raw.url,
            RawListing::Spa(raw) => &raw.url,
        }
    }

    /// Identifier recorded in the crawl state once the listing is processed.
    pub fn identifier(&self) -> &str {
        match self {
            RawListing::SecondeChance(raw) => &raw.url,
            RawListing::Spa(raw) => raw.uid.as_deref().unwrap_or(&raw.url),
        }
    }
}

/// Collectors emit `"None"` or blank strings for missing values.
fn optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(serde_json::Number),
    }

    let value = Option::<TextOrNumber>::deserialize(deserializer)?;
    Ok(match value {
        Some(TextOrNumber::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "None" {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(TextOrNumber::Number(n)) => Some(n.to_string()),
        None => None,
    })
}

/// Compatibility flags arrive as booleans or as French/English words.
fn optional_flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagOrText {
        Flag(bool),
        Text(String),
    }

    let value = Option::<FlagOrText>::deserialize(deserializer)?;
    Ok(match value {
        Some(FlagOrText::Flag(flag)) => Some(flag),
        Some(FlagOrText::Text(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "oui" | "yes" | "1" => Some(true),
            "false" | "non" | "no" | "0" => Some(false),
            _ => None,
        },
        None => None,
    })
}
