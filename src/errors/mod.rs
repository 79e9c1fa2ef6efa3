//! Error handling for the epg-reconcile application
//!
//! This module re-exports the error types used throughout the application.

pub mod types;

pub use types::{AppError, EpgError, GrabberError, PlaylistError};

/// Convenience result type used throughout the application
pub type AppResult<T> = Result<T, AppError>;
