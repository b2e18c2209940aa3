//! Document routes - raw source files and blank-page detection.

use axum::{
    Json,
    body::Body,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use pdf_merger_core::{Detection, DocumentId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::helpers::{ResultExt, RouteResult, blocking};
use crate::state::AppState;

/// Stream a registered document for client-side rendering.
///
/// The content hash doubles as the ETag, so a matching `If-None-Match`
/// skips the read and answers 304.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> RouteResult<Response> {
    let id = DocumentId::parse(id)?;
    let etag = format!("\"{}\"", state.merger.registry().get(&id)?.content_hash);

    let cached = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.split(',').any(|tag| tag.trim() == etag));
    if cached {
        return Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::ETAG, etag)
            .body(Body::empty())
            .or_internal_error();
    }

    let bytes = blocking(move || state.merger.registry().read_content(&id)).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .header(header::ETAG, etag)
        .body(Body::from(bytes))
        .or_internal_error()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DetectRequest {
    source_document_id: DocumentId,
}

#[derive(Serialize)]
pub struct DetectResponse {
    success: bool,
    detections: Vec<Detection>,
}

/// Run the configured detector over one document. Results are advisory.
pub async fn detect_blanks(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> RouteResult<Json<DetectResponse>> {
    let Json(request) = payload?;
    let detections = state.merger.detect(&request.source_document_id).await?;

    Ok(Json(DetectResponse {
        success: true,
        detections,
    }))
}
