// src/storage/sqlite.rs

//! SQLite listing store.
//!
//! Two tables: `listings` keyed by a synthetic id with a unique `url`, and
//! `listing_images` whose rows cascade away with their listing.

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::{AppError, Result};
use crate::models::{Category, Listing, Sex, Source};
use crate::storage::UpsertOutcome;
use crate::utils::fs::ensure_parent;

/// Current schema version. Increment when adding migrations.
pub const CURRENT_VERSION: i32 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    adopted BOOLEAN NOT NULL DEFAULT 0,
    name TEXT,
    species TEXT,
    sex TEXT NOT NULL DEFAULT 'unknown',
    age_text TEXT,
    age REAL,
    category TEXT,
    breed TEXT,
    matched_breed TEXT,
    colors TEXT,
    accepts_dogs BOOLEAN NOT NULL DEFAULT 1,
    accepts_cats BOOLEAN NOT NULL DEFAULT 1,
    accepts_children BOOLEAN NOT NULL DEFAULT 1,
    establishment TEXT,
    establishment_url TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS listing_images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    listing_id INTEGER NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    image_url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listings_source ON listings(source);
CREATE INDEX IF NOT EXISTS idx_listing_images_listing ON listing_images(listing_id);
"#;

const LISTING_COLUMNS: &str = "id, source, url, adopted, name, species, sex, age_text, age, \
     category, breed, matched_breed, colors, accepts_dogs, accepts_cats, accepts_children, \
     establishment, establishment_url";

/// Persistent, deduplicated listing store.
pub struct ListingStore {
    conn: Connection,
}

impl ListingStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        ensure_parent(path)?;

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        let version = schema_version(&conn)?;
        if version == 0 {
            create_schema(&conn)?;
        } else if version > CURRENT_VERSION {
            return Err(AppError::validation(format!(
                "store {} has schema version {version}, newer than supported {CURRENT_VERSION}",
                path.display()
            )));
        }

        log::debug!("Opened listing store {} (schema v{CURRENT_VERSION})", path.display());
        Ok(Self { conn })
    }

    /// Open an in-memory store with the full schema.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        create_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Insert a listing and its images, unless its URL is already stored.
    ///
    /// An existing URL is left untouched: the first stored content wins.
    pub fn upsert(&mut self, listing: &Listing) -> Result<UpsertOutcome> {
        let tx = self.conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO listings (source, url, adopted, name, species, sex, age_text, age,
                 category, breed, matched_breed, colors, accepts_dogs, accepts_cats,
                 accepts_children, establishment, establishment_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
             ON CONFLICT(url) DO NOTHING",
            params![
                listing.source.label(),
                listing.url,
                listing.adopted,
                listing.name,
                listing.species,
                listing.sex.as_str(),
                listing.age_text,
                listing.age,
                listing.category.map(Category::as_str),
                listing.breed,
                listing.matched_breed,
                listing.colors,
                listing.accepts_dogs,
                listing.accepts_cats,
                listing.accepts_children,
                listing.establishment,
                listing.establishment_url,
            ],
        )?;

        if inserted == 0 {
            let id: i64 = tx.query_row(
                "SELECT id FROM listings WHERE url = ?1",
                params![listing.url],
                |row| row.get(0),
            )?;
            tx.commit()?;
            return Ok(UpsertOutcome::AlreadyExists(id));
        }

        let id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO listing_images (listing_id, position, image_url) VALUES (?1, ?2, ?3)",
            )?;
            for (position, image_url) in listing.image_urls.iter().enumerate() {
                stmt.execute(params![id, position as i64, image_url])?;
            }
        }
        tx.commit()?;

        Ok(UpsertOutcome::Inserted(id))
    }

    /// Look up the stored id of a URL.
    pub fn find_id(&self, url: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM listings WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Load a stored listing, images included.
    pub fn find_by_url(&self, url: &str) -> Result<Option<Listing>> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE url = ?1");
        let found = self
            .conn
            .query_row(&sql, params![url], |row| Ok((row.get::<_, i64>(0)?, row_to_listing(row)?)))
            .optional()?;

        match found {
            Some((id, mut listing)) => {
                listing.image_urls = self.image_urls(id)?;
                Ok(Some(listing))
            }
            None => Ok(None),
        }
    }

    /// Image URLs of a listing, in their original order.
    pub fn image_urls(&self, listing_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT image_url FROM listing_images WHERE listing_id = ?1 ORDER BY position, id",
        )?;
        let urls = stmt
            .query_map(params![listing_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(urls)
    }

    /// Flag a listing as adopted. Returns true only when the flag changed.
    pub fn mark_adopted(&self, url: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE listings SET adopted = 1 WHERE url = ?1 AND adopted = 0",
            params![url],
        )?;
        Ok(changed > 0)
    }

    /// Remove a listing and, through the foreign key, its images.
    pub fn delete_listing(&self, listing_id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM listings WHERE id = ?1", params![listing_id])?;
        Ok(deleted > 0)
    }

    /// Number of stored listings, optionally restricted to one source.
    pub fn count(&self, source: Option<Source>) -> Result<usize> {
        self.count_where("1 = 1", source)
    }

    /// Number of listings flagged as adopted.
    pub fn count_adopted(&self, source: Option<Source>) -> Result<usize> {
        self.count_where("adopted = 1", source)
    }

    fn count_where(&self, condition: &str, source: Option<Source>) -> Result<usize> {
        let count: i64 = match source {
            Some(source) => self.conn.query_row(
                &format!("SELECT COUNT(*) FROM listings WHERE {condition} AND source = ?1"),
                params![source.label()],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                &format!("SELECT COUNT(*) FROM listings WHERE {condition}"),
                [],
                |row| row.get(0),
            )?,
        };
        Ok(count as usize)
    }
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [CURRENT_VERSION],
    )?;
    Ok(())
}

/// Current schema version, or 0 if no schema exists.
fn schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;
    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn row_to_listing(row: &Row<'_>) -> rusqlite::Result<Listing> {
    let source: String = row.get(1)?;
    let source = source
        .parse::<Source>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;
    let sex: String = row.get(6)?;
    let category: Option<String> = row.get(9)?;

    Ok(Listing {
        source,
        url: row.get(2)?,
        adopted: row.get(3)?,
        name: row.get(4)?,
        species: row.get(5)?,
        sex: Sex::from_label(Some(&sex)),
        age_text: row.get(7)?,
        age: row.get(8)?,
        category: category.as_deref().and_then(Category::parse),
        breed: row.get(10)?,
        matched_breed: row.get(11)?,
        colors: row.get(12)?,
        accepts_dogs: row.get(13)?,
        accepts_cats: row.get(14)?,
        accepts_children: row.get(15)?,
        establishment: row.get(16)?,
        establishment_url: row.get(17)?,
        image_urls: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn listing(url: &str, name: &str, images: &[&str]) -> Listing {
        let mut listing = Listing::new(Source::SecondeChance, url);
        listing.name = Some(name.to_string());
        listing.sex = Sex::Female;
        listing.age_text = Some("3 ans".to_string());
        listing.age = Some(3.0);
        listing.category = Some(Category::Adult);
        listing.accepts_cats = false;
        listing.image_urls = images.iter().map(|s| s.to_string()).collect();
        listing
    }

    fn image_rows(store: &ListingStore) -> i64 {
        store
            .conn
            .query_row("SELECT COUNT(*) FROM listing_images", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_insert_and_find() {
        let mut store = ListingStore::open_memory().unwrap();
        let original = listing(
            "https://www.secondechance.org/animal/1",
            "Bella",
            &["https://img.example.org/b.jpg", "https://img.example.org/a.jpg"],
        );

        let outcome = store.upsert(&original).unwrap();
        assert!(matches!(outcome, UpsertOutcome::Inserted(_)));

        let found = store.find_by_url(&original.url).unwrap().unwrap();
        assert_eq!(found, original);
        assert_eq!(store.find_by_url("https://nowhere.example.org").unwrap(), None);
    }

    #[test]
    fn test_duplicate_url_keeps_first_content() {
        let mut store = ListingStore::open_memory().unwrap();
        let url = "https://www.secondechance.org/animal/1";

        let first = store.upsert(&listing(url, "Bella", &["https://img.example.org/1.jpg"])).unwrap();
        let second = store
            .upsert(&listing(url, "Other", &["https://img.example.org/2.jpg", "https://img.example.org/3.jpg"]))
            .unwrap();

        assert_eq!(second, UpsertOutcome::AlreadyExists(first.id()));
        assert_eq!(store.count(None).unwrap(), 1);
        assert_eq!(image_rows(&store), 1);
        let stored = store.find_by_url(url).unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Bella"));
    }

    #[test]
    fn test_delete_cascades_to_images() {
        let mut store = ListingStore::open_memory().unwrap();
        let id = store
            .upsert(&listing(
                "https://www.secondechance.org/animal/1",
                "Bella",
                &["https://img.example.org/1.jpg", "https://img.example.org/2.jpg"],
            ))
            .unwrap()
            .id();
        assert_eq!(image_rows(&store), 2);

        assert!(store.delete_listing(id).unwrap());
        assert_eq!(image_rows(&store), 0);
        assert_eq!(store.count(None).unwrap(), 0);
        assert!(!store.delete_listing(id).unwrap());
    }

    #[test]
    fn test_zero_images_store_zero_rows() {
        let mut store = ListingStore::open_memory().unwrap();
        let id = store
            .upsert(&listing("https://www.secondechance.org/animal/1", "Bella", &[]))
            .unwrap()
            .id();
        assert_eq!(image_rows(&store), 0);
        assert!(store.image_urls(id).unwrap().is_empty());
    }

    #[test]
    fn test_image_requires_existing_listing() {
        let store = ListingStore::open_memory().unwrap();
        let result = store.conn.execute(
            "INSERT INTO listing_images (listing_id, position, image_url) VALUES (42, 0, 'x')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_mark_adopted_is_monotonic() {
        let mut store = ListingStore::open_memory().unwrap();
        let url = "https://www.la-spa.fr/adopter-animaux/chien-rex";
        let mut spa = Listing::new(Source::Spa, url);
        spa.name = Some("Rex".into());
        store.upsert(&spa).unwrap();

        assert!(store.mark_adopted(url).unwrap());
        assert!(!store.mark_adopted(url).unwrap());
        assert!(!store.mark_adopted("https://unknown.example.org").unwrap());
        assert_eq!(store.count_adopted(Some(Source::Spa)).unwrap(), 1);
        assert_eq!(store.count_adopted(Some(Source::SecondeChance)).unwrap(), 0);
        assert!(store.find_by_url(url).unwrap().unwrap().adopted);
    }

    #[test]
    fn test_reopen_file_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db/shelters.db");
        {
            let mut store = ListingStore::open(&path).unwrap();
            store
                .upsert(&listing("https://www.secondechance.org/animal/1", "Bella", &[]))
                .unwrap();
        }
        let store = ListingStore::open(&path).unwrap();
        assert_eq!(store.count(None).unwrap(), 1);
        assert_eq!(store.count(Some(Source::SecondeChance)).unwrap(), 1);
        assert_eq!(store.find_id("https://www.secondechance.org/animal/1").unwrap(), Some(1));
    }
}
