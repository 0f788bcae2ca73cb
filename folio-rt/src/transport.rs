//! Progress service client
//!
//! The scheduler talks to the server through [`ProgressTransport`] so tests
//! can substitute a scripted transport. [`HttpTransport`] is the reqwest
//! implementation used by real clients.

use std::time::Duration;

use async_trait::async_trait;
use folio_common::api::{ErrorBody, READ_PROGRESS_PATH};
use folio_common::{ProgressRecord, ProgressUpdate};
use thiserror::Error;

const USER_AGENT: &str = concat!("folio-rt/", env!("CARGO_PKG_VERSION"));

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, timeout or body decoding failure
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned {status} ({code}): {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// HTTP status of a server-side rejection
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Sends progress updates to the server
#[async_trait]
pub trait ProgressTransport: Send + Sync {
    /// Deliver one update and return the server's merged record
    async fn send(&self, update: &ProgressUpdate) -> Result<ProgressRecord, TransportError>;
}

/// reqwest-backed transport authenticated with a session token
#[derive(Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpTransport {
    pub fn new(
        server_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let base = server_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(TransportError::InvalidUrl(server_url.to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: format!("{}{}", base, READ_PROGRESS_PATH),
            token: token.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The caller's record for one article, `None` if never synced
    pub async fn fetch(&self, article_id: &str) -> Result<Option<ProgressRecord>, TransportError> {
        let response = self
            .http_client
            .get(&self.endpoint)
            .bearer_auth(&self.token)
            .query(&[("articleId", article_id)])
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Every record of the caller
    pub async fn fetch_all(&self) -> Result<Vec<ProgressRecord>, TransportError> {
        let response = self
            .http_client
            .get(&self.endpoint)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ProgressTransport for HttpTransport {
    async fn send(&self, update: &ProgressUpdate) -> Result<ProgressRecord, TransportError> {
        tracing::debug!(
            article_id = %update.article_id,
            progress = update.progress,
            time_spent = update.time_spent,
            "Sending progress update"
        );

        let response = self
            .http_client
            .patch(&self.endpoint)
            .bearer_auth(&self.token)
            .json(update)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Turn non-2xx responses into [`TransportError::Status`]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.error.code, body.error.message),
        Err(_) => ("UNKNOWN".to_string(), text),
    };

    Err(TransportError::Status {
        status: status.as_u16(),
        code,
        message,
    })
}
