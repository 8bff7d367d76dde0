// src/services/assembler.rs

//! Raw record → canonical [`Listing`].

use std::collections::HashSet;

use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, Listing, RawListing, SecondeChanceRaw, Sex, Source, SpaRaw};
use crate::reference::ReferenceData;
use crate::services::{AgeReading, AgeResolver, BreedMatcher, NameNormalizer};
use crate::utils::resolve_url;

/// Combines the normalization services into canonical listings.
pub struct RecordAssembler<'a> {
    names: NameNormalizer<'a>,
    ages: AgeResolver,
    breeds: BreedMatcher<'a>,
}

impl<'a> RecordAssembler<'a> {
    pub fn new(config: &Config, refs: &'a ReferenceData) -> Result<Self> {
        Ok(Self {
            names: NameNormalizer::new(&refs.vocabulary, &config.names.noise_acronyms)?,
            ages: AgeResolver::new(config.age),
            breeds: BreedMatcher::new(&refs.breeds),
        })
    }

    /// Build the canonical listing for a raw record.
    ///
    /// Only a missing or non-http(s) listing URL is an error; every other
    /// unparsable field ends up as `None`.
    pub fn assemble(&self, raw: &RawListing) -> Result<Listing> {
        let base = parse_listing_url(raw.url())?;

        let (fields, ages) = match raw {
            RawListing::SecondeChance(raw) => (
                CommonFields::from(raw),
                self.ages.from_text(raw.age_text.as_deref()),
            ),
            RawListing::Spa(raw) => (
                CommonFields::from(raw),
                self.ages.from_birth_date(raw.birthday.as_deref()),
            ),
        };
        let listing = self.build(raw.source(), &base, fields, ages);

        if listing.name.is_none() {
            log::warn!("No usable name for {}", listing.url);
        }
        Ok(listing)
    }

    fn build(&self, source: Source, base: &Url, fields: CommonFields<'_>, ages: AgeReading) -> Listing {
        let mut listing = Listing::new(source, base.as_str());
        listing.name = fields.name.and_then(|n| self.names.normalize(n));
        listing.species = fields.species.map(str::to_string);
        listing.sex = Sex::from_label(fields.sex);
        listing.age_text = ages.age_text;
        listing.age = ages.age;
        listing.category = ages.category;
        listing.breed = normalize_breed(fields.race);
        listing.matched_breed = listing
            .breed
            .as_deref()
            .and_then(|b| self.breeds.match_breed(b, source));
        listing.colors = fields.colors.map(str::to_string);
        listing.accepts_dogs = fields.accepts_dogs.unwrap_or(true);
        listing.accepts_cats = fields.accepts_cats.unwrap_or(true);
        listing.accepts_children = fields.accepts_children.unwrap_or(true);
        listing.establishment = fields.establishment.map(str::to_string);
        listing.establishment_url = fields.establishment_url.map(|href| resolve_url(base, href));
        listing.image_urls = resolve_images(base, fields.images);
        listing
    }
}

/// Fields both sources deliver under the same meaning.
struct CommonFields<'r> {
    name: Option<&'r str>,
    species: Option<&'r str>,
    sex: Option<&'r str>,
    race: Option<&'r str>,
    colors: Option<&'r str>,
    accepts_dogs: Option<bool>,
    accepts_cats: Option<bool>,
    accepts_children: Option<bool>,
    establishment: Option<&'r str>,
    establishment_url: Option<&'r str>,
    images: &'r [String],
}

impl<'r> From<&'r SecondeChanceRaw> for CommonFields<'r> {
    fn from(raw: &'r SecondeChanceRaw) -> Self {
        Self {
            name: raw.name.as_deref(),
            species: raw.species.as_deref(),
            sex: raw.sex.as_deref(),
            race: raw.race.as_deref(),
            colors: raw.colors.as_deref(),
            accepts_dogs: raw.accepts_dogs,
            accepts_cats: raw.accepts_cats,
            accepts_children: raw.accepts_children,
            establishment: raw.establishment.as_deref(),
            establishment_url: raw.establishment_url.as_deref(),
            images: &raw.image_urls,
        }
    }
}

impl<'r> From<&'r SpaRaw> for CommonFields<'r> {
    fn from(raw: &'r SpaRaw) -> Self {
        Self {
            name: raw.name.as_deref(),
            species: raw.species.as_deref(),
            sex: raw.sex.as_deref(),
            race: raw.race.as_deref(),
            colors: raw.colors.as_deref(),
            accepts_dogs: raw.accepts_dogs,
            accepts_cats: raw.accepts_cats,
            accepts_children: raw.accepts_children,
            establishment: raw.establishment.as_deref(),
            establishment_url: raw.establishment_url.as_deref(),
            images: &raw.images,
        }
    }
}

fn parse_listing_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(AppError::validation(format!(
            "listing url '{raw}' has unsupported scheme '{scheme}'"
        ))),
    }
}

/// Breeds are stored lower-cased with collapsed whitespace.
fn normalize_breed(raw: Option<&str>) -> Option<String> {
    let breed = raw?
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    (!breed.is_empty()).then_some(breed)
}

/// Resolve image links against the listing URL, dropping blanks and repeats.
fn resolve_images(base: &Url, images: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    images
        .iter()
        .map(|href| href.trim())
        .filter(|href| !href.is_empty())
        .map(|href| resolve_url(base, href))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}
