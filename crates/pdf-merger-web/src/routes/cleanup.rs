//! Cleanup and health routes.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use chrono::{DateTime, Utc};
use pdf_merger_core::CleanupFailure;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::helpers::{RouteResult, blocking};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupRequest {
    ids: Vec<String>,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    success: bool,
    removed: Vec<String>,
    errors: Vec<CleanupFailure>,
}

/// Delete documents and artifacts by id, reporting each outcome.
pub async fn cleanup(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CleanupRequest>, JsonRejection>,
) -> RouteResult<Json<CleanupResponse>> {
    let Json(request) = payload?;
    let report = blocking(move || Ok(state.merger.cleanup(&request.ids))).await?;

    Ok(Json(CleanupResponse {
        success: report.errors.is_empty(),
        removed: report.removed,
        errors: report.errors,
    }))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now(),
    })
}
