//! Session token handling
//!
//! Callers authenticate with `Authorization: Bearer <token>`. Tokens are
//! issued by the surrounding site; this subsystem only stores and compares
//! their SHA-256 digests, so a leaked database does not leak usable tokens.

use sha2::{Digest, Sha256};

/// Authentication header parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiAuthError {
    /// No Authorization header present
    MissingCredentials,

    /// Header present but not a usable bearer token
    MalformedCredentials(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::MissingCredentials => write!(f, "Missing credentials"),
            ApiAuthError::MalformedCredentials(reason) => {
                write!(f, "Malformed credentials: {}", reason)
            }
        }
    }
}

impl std::error::Error for ApiAuthError {}

/// Extract the token from an `Authorization` header value
///
/// The scheme is matched case-insensitively.
///
/// # Examples
///
/// ```
/// use folio_common::api::auth::parse_bearer;
///
/// assert_eq!(parse_bearer(Some("Bearer abc123")).unwrap(), "abc123");
/// assert!(parse_bearer(Some("Basic abc123")).is_err());
/// assert!(parse_bearer(None).is_err());
/// ```
pub fn parse_bearer(header: Option<&str>) -> Result<&str, ApiAuthError> {
    let header = header.ok_or(ApiAuthError::MissingCredentials)?;

    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| ApiAuthError::MalformedCredentials("expected '<scheme> <token>'".into()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiAuthError::MalformedCredentials(format!(
            "unsupported scheme '{}'",
            scheme
        )));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiAuthError::MalformedCredentials("empty token".into()));
    }

    Ok(token)
}

/// SHA-256 digest of a session token as 64 lowercase hex characters
///
/// # Examples
///
/// ```
/// use folio_common::api::auth::hash_session_token;
///
/// let digest = hash_session_token("secret-token");
/// assert_eq!(digest.len(), 64);
/// assert_eq!(digest, hash_session_token("secret-token"));
/// ```
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
