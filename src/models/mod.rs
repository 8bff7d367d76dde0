// src/models/mod.rs

//! Domain models for the ingestion pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod listing;
mod raw;

// Re-export all public types
pub use config::{AgeThresholds, Config, CrawlerConfig, NamesConfig, PathsConfig};
pub use listing::{Category, Listing, Sex, Source};
pub use raw::{RawListing, SecondeChanceRaw, SpaRaw};
