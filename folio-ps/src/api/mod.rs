//! HTTP API handlers for folio-ps

pub mod auth;
pub mod health;
pub mod progress;

pub use auth::Caller;
pub use health::health_routes;
pub use progress::{get_progress, patch_progress, progress_routes};
