//! Caller identification for protected routes
//!
//! Handlers take a [`Caller`] argument; extraction reads the bearer token
//! and asks the identity collaborator who it belongs to. Anything other than
//! an active member rejects the request before the handler runs.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use folio_common::api::parse_bearer;
use tracing::{debug, warn};

use crate::collab::CallerIdentity;
use crate::error::ApiError;
use crate::AppState;

/// Authenticated member making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub member_id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| value.to_str())
            .transpose()
            .map_err(|_| ApiError::Unauthorized("Authorization header is not valid ASCII".into()))?;

        let token = parse_bearer(header).map_err(|e| {
            debug!("Rejected credentials: {}", e);
            ApiError::Unauthorized(e.to_string())
        })?;

        match state.identity.resolve_caller(token).await? {
            CallerIdentity::Member(member_id) => Ok(Caller { member_id }),
            CallerIdentity::Unauthenticated => {
                Err(ApiError::Unauthorized("Unknown or expired session".into()))
            }
            CallerIdentity::Forbidden(member_id) => {
                warn!(member_id = %member_id, "Banned member attempted progress access");
                Err(ApiError::Forbidden("Member is not allowed to record progress".into()))
            }
        }
    }
}
