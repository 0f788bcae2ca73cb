//! Reading progress endpoints
//!
//! GET   /read-progress[?articleId=]  caller's records, or one record / null
//! PATCH /read-progress               upsert-merge one update

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use folio_common::api::{ProgressQuery, READ_PROGRESS_PATH};
use folio_common::ProgressUpdate;
use tracing::{debug, info};

use crate::api::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /read-progress
///
/// Without `articleId`: every record of the caller, most recent first.
/// With `articleId`: that record, or `null` if the caller never synced it.
/// Unknown articles are 404.
pub async fn get_progress(
    State(state): State<AppState>,
    caller: Caller,
    query: Result<Query<ProgressQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    match query.article_id.as_deref().map(str::trim) {
        Some("") => Err(ApiError::BadRequest("articleId must not be empty".into())),
        Some(article_id) => {
            let record = state.progress.get(&caller.member_id, article_id).await?;
            debug!(
                member_id = %caller.member_id,
                article_id,
                found = record.is_some(),
                "Fetched reading progress"
            );
            Ok(Json(record).into_response())
        }
        None => {
            let records = state.progress.list(&caller.member_id).await?;
            debug!(
                member_id = %caller.member_id,
                count = records.len(),
                "Listed reading progress"
            );
            Ok(Json(records).into_response())
        }
    }
}

/// PATCH /read-progress
///
/// Body `{articleId, progress, timeSpent?}` where `timeSpent` is the number
/// of seconds read since the client's last confirmed sync. Responds with the
/// canonical record: 201 when this write created it, 200 otherwise.
pub async fn patch_progress(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<ProgressUpdate>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(update) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let outcome = state.progress.upsert(&caller.member_id, &update).await?;

    if outcome.created {
        info!(
            member_id = %caller.member_id,
            article_id = %outcome.record.article_id,
            progress = outcome.record.progress,
            "First visit recorded"
        );
    }
    if outcome.record.completed {
        debug!(
            member_id = %caller.member_id,
            article_id = %outcome.record.article_id,
            "Article completed"
        );
    }

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.record)).into_response())
}

/// Build progress routes
pub fn progress_routes() -> Router<AppState> {
    Router::new().route(READ_PROGRESS_PATH, get(get_progress).patch(patch_progress))
}
