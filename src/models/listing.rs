//! Canonical listing record and its enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::AgeThresholds;

/// Upstream shelter a listing was harvested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Scraped HTML detail pages
    #[serde(rename = "Seconde Chance")]
    SecondeChance,

    /// Third-party JSON API
    #[serde(rename = "SPA")]
    Spa,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::SecondeChance, Source::Spa];

    /// File-system friendly name used for export logs and state directories.
    pub fn slug(self) -> &'static str {
        match self {
            Source::SecondeChance => "seconde_chance",
            Source::Spa => "spa",
        }
    }

    /// Key of this source in the breed mapping table.
    pub fn mapping_key(self) -> &'static str {
        match self {
            Source::SecondeChance => "seconde chance",
            Source::Spa => "spa",
        }
    }

    /// Display label, as stored in the `source` column.
    pub fn label(self) -> &'static str {
        match self {
            Source::SecondeChance => "Seconde Chance",
            Source::Spa => "SPA",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "seconde-chance" | "secondechance" => Ok(Source::SecondeChance),
            "spa" => Ok(Source::Spa),
            other => Err(format!(
                "unknown source '{other}' (expected 'seconde-chance' or 'spa')"
            )),
        }
    }
}

/// Sex of the animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl Sex {
    /// Interpret a source label such as "Mâle", "femelle", "M" or "F".
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(first) = label.and_then(|l| l.trim().chars().next()) else {
            return Sex::Unknown;
        };
        match first.to_ascii_lowercase() {
            'm' => Sex::Male,
            'f' => Sex::Female,
            _ => Sex::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::Unknown => "unknown",
        }
    }
}

/// Coarse life-stage bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Junior,
    Adult,
    Senior,
}

impl Category {
    /// Bucket a canonical age using half-open thresholds.
    pub fn from_age(age: f64, thresholds: &AgeThresholds) -> Self {
        if age < thresholds.junior_below {
            Category::Junior
        } else if age < thresholds.senior_from {
            Category::Adult
        } else {
            Category::Senior
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Junior => "junior",
            Category::Adult => "adult",
            Category::Senior => "senior",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "junior" => Some(Category::Junior),
            "adult" => Some(Category::Adult),
            "senior" => Some(Category::Senior),
            _ => None,
        }
    }
}

/// A shelter animal's canonical, normalized record.
///
/// Field order is the export order: serde serializes struct fields in
/// declaration order, so every export line has the same layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub source: Source,
    pub url: String,
    #[serde(default)]
    pub adopted: bool,
    pub name: Option<String>,
    pub species: Option<String>,
    #[serde(default)]
    pub sex: Sex,
    pub age_text: Option<String>,
    pub age: Option<f64>,
    pub category: Option<Category>,
    pub breed: Option<String>,
    pub matched_breed: Option<String>,
    pub colors: Option<String>,
    #[serde(default = "default_true")]
    pub accepts_dogs: bool,
    #[serde(default = "default_true")]
    pub accepts_cats: bool,
    #[serde(default = "default_true")]
    pub accepts_children: bool,
    pub establishment: Option<String>,
    pub establishment_url: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Listing {
    /// Empty listing for a URL, with every derived field unset.
    pub fn new(source: Source, url: impl Into<String>) -> Self {
        Self {
            source,
            url: url.into(),
            adopted: false,
            name: None,
            species: None,
            sex: Sex::Unknown,
            age_text: None,
            age: None,
            category: None,
            breed: None,
            matched_breed: None,
            colors: None,
            accepts_dogs: true,
            accepts_cats: true,
            accepts_children: true,
            establishment: None,
            establishment_url: None,
            image_urls: Vec::new(),
        }
    }
}
