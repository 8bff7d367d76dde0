// src/state.rs

//! Durable record of what has already been processed.
//!
//! Each identifier class (pages, listings) is an append-only newline-delimited
//! log, loaded in full when opened and appended to one item at a time.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

const PAGES_FILE: &str = "visited_pages.txt";
const LISTINGS_FILE: &str = "visited_listings.txt";

/// One persisted set of opaque identifiers.
#[derive(Debug)]
pub struct VisitedLog {
    path: PathBuf,
    seen: HashSet<String>,
    file: File,
}

impl VisitedLog {
    /// Load the log at `path`, creating it if missing.
    ///
    /// A trailing fragment with no newline is the remains of an interrupted
    /// append; it is truncated away.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(AppError::Io(e)),
        };

        let complete_len = content.rfind('\n').map_or(0, |end| end + 1);
        if complete_len < content.len() {
            log::warn!(
                "Truncating torn entry {:?} at end of {}",
                &content[complete_len..],
                path.display()
            );
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(complete_len as u64)?;
            file.sync_all()?;
        }

        let seen: HashSet<String> = content[..complete_len]
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        log::debug!("Loaded {} entries from {}", seen.len(), path.display());
        Ok(Self { path, seen, file })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Record `id`. Returns false, without writing, if it was already there.
    pub fn insert(&mut self, id: &str) -> Result<bool> {
        if id.is_empty() || id.contains(['\n', '\r']) {
            return Err(AppError::state(format!(
                "invalid identifier {id:?} for {}",
                self.path.display()
            )));
        }
        if self.seen.contains(id) {
            return Ok(false);
        }

        self.file.write_all(format!("{id}\n").as_bytes())?;
        self.file.flush()?;
        self.seen.insert(id.to_string());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Processed pages and listings of one source.
#[derive(Debug)]
pub struct CrawlState {
    pub pages: VisitedLog,
    pub listings: VisitedLog,
}

impl CrawlState {
    /// Open both logs under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            pages: VisitedLog::open(dir.join(PAGES_FILE))?,
            listings: VisitedLog::open(dir.join(LISTINGS_FILE))?,
        })
    }

    /// Delete both logs under `dir`. Missing files are fine.
    pub fn reset(dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        for name in [PAGES_FILE, LISTINGS_FILE] {
            match fs::remove_file(dir.join(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(AppError::Io(e)),
            }
        }
        log::info!("Cleared crawl state in {}", dir.display());
        Ok(())
    }

    pub fn is_page_processed(&self, token: &str) -> bool {
        self.pages.contains(token)
    }

    pub fn mark_page_processed(&mut self, token: &str) -> Result<bool> {
        self.pages.insert(token)
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.listings.contains(id)
    }

    pub fn mark_processed(&mut self, id: &str) -> Result<bool> {
        self.listings.insert(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = VisitedLog::open(dir.path().join("spa/visited_listings.txt")).unwrap();
        assert!(log.is_empty());
        assert!(!log.contains("48213"));
    }

    #[test]
    fn test_insert_persists_immediately() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visited_listings.txt");

        let mut log = VisitedLog::open(&path).unwrap();
        assert!(log.insert("48213").unwrap());
        assert!(!log.insert("48213").unwrap());
        assert!(log.insert("https://www.secondechance.org/animal/1").unwrap());

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "48213\nhttps://www.secondechance.org/animal/1\n"
        );
    }

    #[test]
    fn test_rejects_invalid_identifiers() {
        let dir = TempDir::new().unwrap();
        let mut log = VisitedLog::open(dir.path().join("visited.txt")).unwrap();
        assert!(matches!(log.insert(""), Err(AppError::State(_))));
        assert!(matches!(log.insert("a\nb"), Err(AppError::State(_))));
        assert!(log.is_empty());
    }

    #[test]
    fn test_replay_after_crash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visited_listings.txt");
        {
            let mut log = VisitedLog::open(&path).unwrap();
            log.insert("1").unwrap();
            log.insert("2").unwrap();
        }
        // Interrupted mid-append.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"3").unwrap();
        drop(file);

        let mut log = VisitedLog::open(&path).unwrap();
        assert!(log.contains("1"));
        assert!(log.contains("2"));
        assert!(!log.contains("3"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\n2\n");

        assert!(log.insert("3").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\n2\n3\n");
    }

    #[test]
    fn test_crawl_state_reset() {
        let dir = TempDir::new().unwrap();
        {
            let mut state = CrawlState::open(dir.path()).unwrap();
            state.mark_page_processed("page-1").unwrap();
            state.mark_processed("48213").unwrap();
            assert!(state.is_page_processed("page-1"));
            assert!(state.is_processed("48213"));
        }

        CrawlState::reset(dir.path()).unwrap();
        CrawlState::reset(dir.path()).unwrap();

        let state = CrawlState::open(dir.path()).unwrap();
        assert!(!state.is_page_processed("page-1"));
        assert!(!state.is_processed("48213"));
    }
}
