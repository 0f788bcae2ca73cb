//! API module for shared HTTP API functionality
//!
//! Provides the pieces of the progress API that both the server (folio-ps)
//! and the tracker (folio-rt) need to agree on.
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Shared wire types
//!
//! Each crate wraps these with its own framework code (axum extractors on the
//! server, reqwest calls on the tracker).

pub mod auth;
pub mod types;

pub use auth::{hash_session_token, parse_bearer, ApiAuthError};
pub use types::{ErrorBody, ErrorDetail, HealthResponse, ProgressQuery};

/// Path of the progress resource
pub const READ_PROGRESS_PATH: &str = "/read-progress";
