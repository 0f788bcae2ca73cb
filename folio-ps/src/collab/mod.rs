//! External collaborators: identity resolution and the content catalog
//!
//! The progress service only consumes these as capability calls. The SQLite
//! adapters read tables mirrored from the account service and the content
//! store; deployments with live services can plug in their own impls.

use async_trait::async_trait;
use folio_common::Result;

pub mod directory;
mod sqlite;

pub use sqlite::{SqliteArticleCatalog, SqliteIdentityResolver};

/// Outcome of resolving a caller's credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerIdentity {
    /// Recognized member allowed to record progress
    Member(String),
    /// Unknown or expired credentials
    Unauthenticated,
    /// Recognized member that is not allowed (banned)
    Forbidden(String),
}

/// Resolves a bearer token to a member
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_caller(&self, token: &str) -> Result<CallerIdentity>;
}

/// Answers whether a content unit exists
#[async_trait]
pub trait ArticleCatalog: Send + Sync {
    async fn article_exists(&self, article_id: &str) -> Result<bool>;
}
