// src/pipeline/ingest.rs

//! Raw listings → store + export log, with crawl state bookkeeping.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Config, Listing, RawListing, Source};
use crate::reference::ReferenceData;
use crate::services::RecordAssembler;
use crate::state::CrawlState;
use crate::storage::{ExportLog, ListingStore, UpsertOutcome};

/// What happened to a single raw listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Already recorded in the crawl state
    Skipped,
    /// New listing, stored and exported
    Inserted(i64),
    /// URL already stored; the stored row is left as it was
    AlreadyExists(i64),
}

/// Summary of an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestStats {
    pub source: Source,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub lines: usize,
    pub inserted: usize,
    pub already_stored: usize,
    pub skipped: usize,
    pub malformed: usize,
    pub rejected: usize,
    /// The page token was already processed, so the input was not read
    pub page_skipped: bool,
}

impl IngestStats {
    fn new(source: Source) -> Self {
        let now = Utc::now();
        Self {
            source,
            start_time: now,
            end_time: now,
            lines: 0,
            inserted: 0,
            already_stored: 0,
            skipped: 0,
            malformed: 0,
            rejected: 0,
            page_skipped: false,
        }
    }
}

/// Drives raw listings of one source through assembly and storage.
pub struct Ingestor<'a> {
    source: Source,
    assembler: RecordAssembler<'a>,
    store: &'a mut ListingStore,
    export: ExportLog,
    /// URLs already in the export log, loaded on first need
    exported: Option<HashSet<String>>,
    state: CrawlState,
}

impl<'a> Ingestor<'a> {
    /// Open the export log and crawl state of `source` as configured.
    pub fn new(
        config: &Config,
        refs: &'a ReferenceData,
        store: &'a mut ListingStore,
        source: Source,
    ) -> Result<Self> {
        Ok(Self {
            source,
            assembler: RecordAssembler::new(config, refs)?,
            store,
            export: ExportLog::new(config.paths.export_log(source)),
            exported: None,
            state: CrawlState::open(config.paths.state_dir_for(source))?,
        })
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    /// Process one raw listing.
    ///
    /// The listing is marked processed only after it has been stored and
    /// exported, so an interrupted run picks it up again. An identifier the
    /// crawl state cannot record is rejected before anything is written.
    pub fn ingest(&mut self, raw: &RawListing) -> Result<IngestOutcome> {
        if raw.source() != self.source {
            return Err(AppError::validation(format!(
                "{} listing handed to the {} ingestor",
                raw.source(),
                self.source
            )));
        }

        let id = raw.identifier();
        if id.trim().is_empty() || id.contains(['\n', '\r']) {
            return Err(AppError::validation(format!("unusable identifier {id:?}")));
        }
        if self.state.is_processed(id) {
            log::debug!("Skipping already processed {id}");
            return Ok(IngestOutcome::Skipped);
        }

        let listing = self.assembler.assemble(raw)?;
        let outcome = match self.store.upsert(&listing)? {
            UpsertOutcome::Inserted(row) => {
                self.append_export(&listing)?;
                log::debug!("Stored {} as #{row}", listing.url);
                IngestOutcome::Inserted(row)
            }
            UpsertOutcome::AlreadyExists(row) => {
                log::debug!("{} already stored as #{row}", listing.url);
                self.repair_export(&listing.url)?;
                IngestOutcome::AlreadyExists(row)
            }
        };

        self.state.mark_processed(id)?;
        Ok(outcome)
    }

    fn append_export(&mut self, listing: &Listing) -> Result<()> {
        self.export.append(listing)?;
        if let Some(exported) = &mut self.exported {
            exported.insert(listing.url.clone());
        }
        Ok(())
    }

    /// Export the stored version of `url` if an earlier run stored it but
    /// stopped before appending it to the export log.
    fn repair_export(&mut self, url: &str) -> Result<()> {
        if self.exported.is_none() {
            let urls = self.export.load()?.into_iter().map(|l| l.url).collect();
            self.exported = Some(urls);
        }
        if self.exported.as_ref().is_some_and(|urls| urls.contains(url)) {
            return Ok(());
        }

        if let Some(stored) = self.store.find_by_url(url)? {
            log::warn!("{url} was stored but never exported, appending it now");
            self.append_export(&stored)?;
        }
        Ok(())
    }

    /// Process a JSONL stream of raw listings.
    ///
    /// With a page token, the whole stream is skipped when the token is
    /// already recorded, and the token is recorded once the stream is fully
    /// consumed. Malformed lines and listings without a usable URL or
    /// identifier are logged and left unprocessed.
    pub fn ingest_lines(&mut self, reader: impl BufRead, page: Option<&str>) -> Result<IngestStats> {
        let mut stats = IngestStats::new(self.source);

        if let Some(token) = page {
            if token.trim().is_empty() || token.contains(['\n', '\r']) {
                return Err(AppError::validation(format!("unusable page token {token:?}")));
            }
            if self.state.is_page_processed(token) {
                log::info!("Page {token} already processed for {}", self.source);
                stats.page_skipped = true;
                stats.end_time = Utc::now();
                return Ok(stats);
            }
        }

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            stats.lines += 1;

            let raw = match RawListing::from_json(self.source, &line) {
                Ok(raw) => raw,
                Err(e) => {
                    log::warn!("Line {}: malformed {} record: {e}", index + 1, self.source);
                    stats.malformed += 1;
                    continue;
                }
            };

            match self.ingest(&raw) {
                Ok(IngestOutcome::Inserted(_)) => stats.inserted += 1,
                Ok(IngestOutcome::AlreadyExists(_)) => stats.already_stored += 1,
                Ok(IngestOutcome::Skipped) => stats.skipped += 1,
                Err(e @ (AppError::Validation(_) | AppError::Url(_))) => {
                    log::warn!("Line {}: rejected {}: {e}", index + 1, raw.url());
                    stats.rejected += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(token) = page {
            self.state.mark_page_processed(token)?;
        }

        stats.end_time = Utc::now();
        Ok(stats)
    }
}

/// Ingest a raw JSONL file for one source.
pub fn run_ingest(
    config: &Config,
    refs: &ReferenceData,
    store: &mut ListingStore,
    source: Source,
    input: &Path,
    page: Option<&str>,
) -> Result<IngestStats> {
    log::info!("Ingesting {} listings from {}", source, input.display());

    let reader = BufReader::new(File::open(input)?);
    let mut ingestor = Ingestor::new(config, refs, store, source)?;
    let stats = ingestor.ingest_lines(reader, page)?;

    log::info!(
        "{}: {} new, {} already stored, {} skipped, {} malformed, {} rejected ({} ms)",
        source,
        stats.inserted,
        stats.already_stored,
        stats.skipped,
        stats.malformed,
        stats.rejected,
        (stats.end_time - stats.start_time).num_milliseconds()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{BreedMapping, Vocabulary};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.data_dir = dir.path().join("data");
        config.paths.state_dir = dir.path().join("cache");
        config
    }

    fn refs() -> ReferenceData {
        let mut breeds = BreedMapping::default();
        breeds.insert(Source::Spa, "beagle", "Beagle");
        ReferenceData::new(Vocabulary::from_words(["adorable"]), breeds)
    }

    const SPA_PAGE: &str = r#"{"uid": "1", "url": "https://www.la-spa.fr/adopter/chien-rex-1", "name": "REX", "race": "Beagle", "birthday": "Né le 2020-01-01"}
{"uid": "2", "url": "https://www.la-spa.fr/adopter/chien-uma-2", "name": "Adorable Uma"}
this is not json

{"uid": "3", "url": "mailto:someone@example.org"}
"#;

    #[test]
    fn test_ingest_lines_counts_outcomes() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let refs = refs();
        let mut store = ListingStore::open_memory().unwrap();

        let mut ingestor = Ingestor::new(&config, &refs, &mut store, Source::Spa).unwrap();
        let stats = ingestor.ingest_lines(Cursor::new(SPA_PAGE), Some("page-1")).unwrap();

        assert_eq!(stats.lines, 4);
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.rejected, 1);
        assert!(ingestor.state().is_page_processed("page-1"));
        assert!(ingestor.state().is_processed("1"));
        assert!(!ingestor.state().is_processed("3"));

        let exported = ExportLog::new(config.paths.export_log(Source::Spa)).load().unwrap();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[0].name.as_deref(), Some("Rex"));
        assert_eq!(exported[0].matched_breed.as_deref(), Some("Beagle"));
        assert_eq!(exported[1].name.as_deref(), Some("Uma"));

        drop(ingestor);
        assert_eq!(store.count(Some(Source::Spa)).unwrap(), 2);
    }

    #[test]
    fn test_processed_page_is_skipped() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let refs = refs();
        let mut store = ListingStore::open_memory().unwrap();

        let mut ingestor = Ingestor::new(&config, &refs, &mut store, Source::Spa).unwrap();
        ingestor.ingest_lines(Cursor::new(SPA_PAGE), Some("page-1")).unwrap();
        let again = ingestor.ingest_lines(Cursor::new(SPA_PAGE), Some("page-1")).unwrap();

        assert!(again.page_skipped);
        assert_eq!(again.lines, 0);
    }

    #[test]
    fn test_processed_listing_is_skipped_and_duplicates_not_exported() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let refs = refs();
        let mut store = ListingStore::open_memory().unwrap();
        let line = r#"{"uid": "1", "url": "https://www.la-spa.fr/adopter/chien-rex-1", "name": "Rex"}"#;
        let same_url = r#"{"uid": "9", "url": "https://www.la-spa.fr/adopter/chien-rex-1", "name": "Max"}"#;

        let mut ingestor = Ingestor::new(&config, &refs, &mut store, Source::Spa).unwrap();
        let first = ingestor.ingest(&RawListing::from_json(Source::Spa, line).unwrap()).unwrap();
        let again = ingestor.ingest(&RawListing::from_json(Source::Spa, line).unwrap()).unwrap();
        let dup = ingestor.ingest(&RawListing::from_json(Source::Spa, same_url).unwrap()).unwrap();

        assert!(matches!(first, IngestOutcome::Inserted(_)));
        assert_eq!(again, IngestOutcome::Skipped);
        assert!(matches!(dup, IngestOutcome::AlreadyExists(_)));
        assert!(ingestor.state().is_processed("9"));

        let exported = ExportLog::new(config.paths.export_log(Source::Spa)).load().unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].name.as_deref(), Some("Rex"));
    }

    #[test]
    fn test_multiline_identifier_is_rejected_without_stopping_the_run() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let refs = refs();
        let mut store = ListingStore::open_memory().unwrap();
        let page = r#"{"uid": "12\n3", "url": "https://www.la-spa.fr/adopter/chien-rex-12", "name": "Rex"}
{"uid": "4", "url": "https://www.la-spa.fr/adopter/chien-uma-4", "name": "Uma"}
"#;

        for _ in 0..2 {
            let mut ingestor = Ingestor::new(&config, &refs, &mut store, Source::Spa).unwrap();
            let stats = ingestor.ingest_lines(Cursor::new(page), None).unwrap();
            assert_eq!(stats.rejected, 1);
            assert!(ingestor.state().is_processed("4"));
        }

        assert_eq!(store.count(None).unwrap(), 1);
        assert!(store.find_by_url("https://www.la-spa.fr/adopter/chien-rex-12").unwrap().is_none());
        assert!(store.find_by_url("https://www.la-spa.fr/adopter/chien-uma-4").unwrap().is_some());
    }

    #[test]
    fn test_stored_but_unexported_listing_is_exported_on_resume() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let refs = refs();
        let mut store = ListingStore::open_memory().unwrap();
        let url = "https://www.la-spa.fr/adopter/chien-rex-1";

        // A previous run stored the row, then stopped before exporting it.
        let mut stored = Listing::new(Source::Spa, url);
        stored.name = Some("Rex".into());
        store.upsert(&stored).unwrap();

        let mut ingestor = Ingestor::new(&config, &refs, &mut store, Source::Spa).unwrap();
        let first = RawListing::from_json(Source::Spa, &format!(r#"{{"uid": "1", "url": "{url}", "name": "Max"}}"#)).unwrap();
        let second = RawListing::from_json(Source::Spa, &format!(r#"{{"uid": "2", "url": "{url}"}}"#)).unwrap();
        assert!(matches!(ingestor.ingest(&first).unwrap(), IngestOutcome::AlreadyExists(_)));
        assert!(matches!(ingestor.ingest(&second).unwrap(), IngestOutcome::AlreadyExists(_)));

        let exported = ExportLog::new(config.paths.export_log(Source::Spa)).load().unwrap();
        assert_eq!(exported, vec![stored]);
    }

    #[test]
    fn test_wrong_source_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let refs = refs();
        let mut store = ListingStore::open_memory().unwrap();

        let mut ingestor = Ingestor::new(&config, &refs, &mut store, Source::Spa).unwrap();
        let raw = RawListing::from_json(
            Source::SecondeChance,
            r#"{"url": "https://www.secondechance.org/animal/1"}"#,
        )
        .unwrap();
        assert!(matches!(ingestor.ingest(&raw), Err(AppError::Validation(_))));
    }
}
