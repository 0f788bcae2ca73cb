//! # Folio Common Library
//!
//! Shared code for the Folio reading-progress services including:
//! - Progress record model and merge rules
//! - Request validation
//! - API request/response types and session token hashing
//! - Configuration loading and root folder resolution
//! - Database schema initialization (feature `sqlx`)

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod progress;
pub mod time;

pub use error::{Error, Result};
pub use progress::{
    ProgressDelta, ProgressRecord, ProgressUpdate, COMPLETION_THRESHOLD, MAX_TIME_SPENT,
};
