//! Download route - merged PDF retrieval.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use std::sync::Arc;
use tracing::info;

use crate::helpers::{ResultExt, RouteResult, blocking};
use crate::state::AppState;

/// Download a merged PDF. The first download starts its retention timer.
pub async fn download_pdf(
    State(state): State<Arc<AppState>>,
    Path(artifact_id): Path<String>,
) -> RouteResult<Response> {
    let store = Arc::clone(&state);
    let download = blocking(move || store.merger.artifacts().retrieve(&artifact_id)).await?;

    if download.first_retrieval {
        info!("Artifact {} downloaded", download.id);
        state.schedule_expiry(download.id.clone());
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", download.file_name),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(download.bytes))
        .or_internal_error()
}
