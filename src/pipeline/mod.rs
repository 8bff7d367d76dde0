//! Pipeline entry points.
//!
//! - `run_ingest`: Normalize raw listings into the store and export log
//! - `run_revise`: Flag listings whose page has disappeared as adopted

pub mod ingest;
pub mod revise;

pub use ingest::{IngestOutcome, IngestStats, Ingestor, run_ingest};
pub use revise::{LivenessReviser, RevisionReport, run_revise};
