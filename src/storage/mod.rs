//! Persistence for canonical listings.
//!
//! ## Layout
//!
//! ```text
//! data/
//! ├── shelters.db             # SQLite store: listings + listing_images
//! ├── seconde_chance.jsonl    # Export log, one Listing per line
//! └── spa.jsonl
//! ```

pub mod export;
pub mod sqlite;

pub use export::ExportLog;
pub use sqlite::ListingStore;

/// Result of storing a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was written with this id
    Inserted(i64),
    /// The URL was already stored under this id; nothing changed
    AlreadyExists(i64),
}

impl UpsertOutcome {
    pub fn id(self) -> i64 {
        match self {
            UpsertOutcome::Inserted(id) | UpsertOutcome::AlreadyExists(id) => id,
        }
    }
}
