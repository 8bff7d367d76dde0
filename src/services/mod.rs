//! Service layer for the ingestion pipeline.
//!
//! This module contains the normalization logic for:
//! - Display name cleaning (`NameNormalizer`)
//! - Age derivation (`AgeResolver`)
//! - Breed matching (`BreedMatcher`)
//! - Canonical record assembly (`RecordAssembler`)
//! - Liveness probing (`LivenessProbe`, `HttpProbe`)

mod ages;
mod assembler;
mod breeds;
mod names;
mod probe;

pub use ages::{AgeReading, AgeResolver};
pub use assembler::RecordAssembler;
pub use breeds::BreedMatcher;
pub use names::NameNormalizer;
pub use probe::{HttpProbe, LivenessProbe, ProbeOutcome};
