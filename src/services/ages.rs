// src/services/ages.rs

//! Canonical age derivation.
//!
//! Seconde Chance publishes a free-text age ("2 ans 6 mois"), the SPA API a
//! birth date ("Né le 2019-05-04"). Both are reduced to a number of years
//! rounded to two decimals, and bucketed with a single threshold pair.

use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;

use crate::models::{AgeThresholds, Category};

static YEARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(?:ans?|years?)\b").unwrap());
static MONTHS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(?:mois|months?)\b").unwrap());
static DATE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{1,2}-\d{1,2}|\d{1,2}/\d{1,2}/\d{4}").unwrap());

/// Accepted birth date formats, tried in order.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Resolved age fields of a listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgeReading {
    /// Display text
    pub age_text: Option<String>,
    /// Age in years, two decimals
    pub age: Option<f64>,
    pub category: Option<Category>,
}

/// Converts source-specific age representations into canonical ages.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgeResolver {
    thresholds: AgeThresholds,
}

impl AgeResolver {
    pub fn new(thresholds: AgeThresholds) -> Self {
        Self { thresholds }
    }

    /// Parse a free-text age. The text is kept for display even when no
    /// year or month count can be found in it.
    pub fn from_text(&self, text: Option<&str>) -> AgeReading {
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return AgeReading::default();
        };

        let years = capture_number(&YEARS, text);
        let months = capture_number(&MONTHS, text);

        if years.is_none() && months.is_none() {
            log::warn!("Unparsable age text '{}'", text);
            return AgeReading {
                age_text: Some(text.to_string()),
                ..AgeReading::default()
            };
        }

        let age = years_and_months(years.unwrap_or(0), months.unwrap_or(0));
        self.reading(text.to_string(), age)
    }

    /// Derive the age from a descriptive birth date, as of today.
    pub fn from_birth_date(&self, text: Option<&str>) -> AgeReading {
        self.from_birth_date_at(text, Local::now().date_naive())
    }

    /// Derive the age from a descriptive birth date, as of `today`.
    pub fn from_birth_date_at(&self, text: Option<&str>, today: NaiveDate) -> AgeReading {
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return AgeReading::default();
        };

        let Some(birth) = parse_birth_date(text) else {
            log::warn!("Unparsable birth date '{}'", text);
            return AgeReading::default();
        };

        let Some((years, months)) = elapsed(birth, today) else {
            log::warn!("Birth date '{}' is after {}", text, today);
            return AgeReading::default();
        };

        let age = years_and_months(years, months);
        self.reading(display_text(years, months), age)
    }

    /// Bucket an age with the configured thresholds.
    pub fn category(&self, age: f64) -> Category {
        Category::from_age(age, &self.thresholds)
    }

    fn reading(&self, age_text: String, age: f64) -> AgeReading {
        AgeReading {
            age_text: Some(age_text),
            age: Some(age),
            category: Some(self.category(age)),
        }
    }
}

fn capture_number(pattern: &Regex, text: &str) -> Option<u32> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn years_and_months(years: u32, months: u32) -> f64 {
    round2(f64::from(years) + f64::from(months) / 12.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn parse_birth_date(text: &str) -> Option<NaiveDate> {
    let token = DATE_TOKEN.find(text)?.as_str();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
}

/// Whole years and remaining months between two dates.
fn elapsed(birth: NaiveDate, today: NaiveDate) -> Option<(u32, u32)> {
    let mut years = today.year() - birth.year();
    let mut months = today.month() as i32 - birth.month() as i32;

    if today.day() < birth.day() {
        months -= 1;
    }
    if months < 0 {
        years -= 1;
        months += 12;
    }

    if years < 0 {
        return None;
    }
    Some((years as u32, months as u32))
}

/// "<Y> years <M> months", omitting zero components.
fn display_text(years: u32, months: u32) -> String {
    match (years, months) {
        (0, months) => format!("{months} months"),
        (years, 0) => format!("{years} years"),
        (years, months) => format!("{years} years {months} months"),
    }
}
