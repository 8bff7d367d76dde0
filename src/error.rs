// src/error.rs

//! Unified error handling for the ingestion pipeline.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// SQLite operation failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Reference data (vocabulary, breed mapping) could not be loaded
    #[error("Reference data error for {path}: {message}")]
    Reference { path: String, message: String },

    /// Crawl state log error
    #[error("Crawl state error: {0}")]
    State(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a reference data error for the given file.
    pub fn reference(path: impl AsRef<Path>, message: impl fmt::Display) -> Self {
        Self::Reference {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }

    /// Create a crawl state error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }
}
