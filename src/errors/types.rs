//! Error type definitions for the epg-reconcile application
//!
//! This module defines all error types used throughout the application,
//! providing a hierarchical error system that makes debugging and error
//! handling more straightforward.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level application error type
///
/// This enum represents all possible errors that can occur in the application.
/// It uses `thiserror` to provide automatic error trait implementations and
/// proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// Playlist parsing/serialization errors
    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    /// EPG document handling errors
    #[error("EPG error: {0}")]
    Epg(#[from] EpgError),

    /// External grabber invocation errors
    #[error("Grabber error: {0}")]
    Grabber(#[from] GrabberError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A required input document is absent or unreadable
    #[error("Missing input: {path} ({message})")]
    MissingInput { path: PathBuf, message: String },

    /// A run would otherwise silently produce an empty result set
    #[error("Empty result: {message}")]
    EmptyResult { message: String },

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Tabular input/output errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Playlist document specific errors
#[derive(Error, Debug)]
pub enum PlaylistError {
    /// The document does not start with the #EXTM3U header marker
    #[error("Not a valid M3U document (missing #EXTM3U header): {path}")]
    MissingHeader { path: PathBuf },

    /// A metadata line could not be parsed
    #[error("Invalid EXTINF line {line}: {message}")]
    InvalidExtinf { line: usize, message: String },
}

/// EPG document specific errors
#[derive(Error, Debug)]
pub enum EpgError {
    /// XML parsing failure for a document
    #[error("Malformed XMLTV document {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    /// The decompressed document is not valid UTF-8
    #[error("XMLTV document {path} is not valid UTF-8: {message}")]
    Encoding { path: PathBuf, message: String },

    /// No usable EPG documents were found for a catalog build
    #[error("No XMLTV documents found in {dir}")]
    NoDocuments { dir: PathBuf },
}

/// External grabber invocation errors
#[derive(Error, Debug)]
pub enum GrabberError {
    /// The grabber binary is not installed or not on PATH
    #[error("Grabber command not found: {command}")]
    NotFound { command: String },

    /// The grabber exited with a non-zero status
    #[error("Grabber '{command}' failed with status {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// The grabber did not complete within the configured timeout
    #[error("Grabber '{command}' timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a missing-input error
    pub fn missing_input<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::MissingInput {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an empty-result error
    pub fn empty_result<S: Into<String>>(message: S) -> Self {
        Self::EmptyResult {
            message: message.into(),
        }
    }
}
