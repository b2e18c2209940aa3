//! Merge route - plan and assemble a merge request.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use pdf_merger_core::{ArtifactId, MergeRequest};
use serde::Serialize;
use std::sync::Arc;

use crate::helpers::{RouteResult, blocking};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    success: bool,
    output_artifact_id: ArtifactId,
    #[serde(rename = "fileSizeKB")]
    file_size_kb: u64,
    page_count: usize,
    download_locator: String,
}

pub async fn merge_pdfs(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MergeRequest>, JsonRejection>,
) -> RouteResult<Json<MergeResponse>> {
    let Json(request) = payload?;
    let result = blocking(move || state.merger.merge(&request)).await?;

    Ok(Json(MergeResponse {
        success: true,
        download_locator: format!("/api/pdf/download/{}", result.artifact_id),
        file_size_kb: result.file_size_kb(),
        page_count: result.page_count,
        output_artifact_id: result.artifact_id,
    }))
}
