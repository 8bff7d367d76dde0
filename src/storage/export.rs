// src/storage/export.rs

//! Per-source JSONL export of canonical listings.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::Listing;
use crate::utils::fs::{ensure_parent, write_atomic};

/// Append-only export file, rewritten whole only by the liveness pass.
#[derive(Debug, Clone)]
pub struct ExportLog {
    path: PathBuf,
}

impl ExportLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one listing as a single JSON line.
    pub fn append(&self, listing: &Listing) -> Result<()> {
        ensure_parent(&self.path)?;

        let mut line = serde_json::to_string(listing)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Read every listing. A missing file is an empty log.
    ///
    /// An unterminated last line is an interrupted append and is dropped with
    /// a warning; any other malformed line is an error.
    pub fn load(&self) -> Result<Vec<Listing>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let complete = match content.rfind('\n') {
            Some(end) => &content[..=end],
            None => "",
        };
        let torn = &content[complete.len()..];
        if !torn.trim().is_empty() {
            log::warn!(
                "Dropping unterminated trailing line in {}",
                self.path.display()
            );
        }

        let mut listings = Vec::new();
        for (index, line) in complete.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let listing = serde_json::from_str(line).map_err(|e| {
                AppError::validation(format!(
                    "{} line {}: {e}",
                    self.path.display(),
                    index + 1
                ))
            })?;
            listings.push(listing);
        }
        Ok(listings)
    }

    /// Replace the whole log atomically.
    pub fn rewrite(&self, listings: &[Listing]) -> Result<()> {
        let mut buf = Vec::new();
        for listing in listings {
            serde_json::to_writer(&mut buf, listing)?;
            buf.push(b'\n');
        }
        write_atomic(&self.path, &buf)
    }
}
