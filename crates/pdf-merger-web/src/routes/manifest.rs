//! Manifest routes.
//!
//! The client owns the manifest and sends it whole; each endpoint applies one
//! pure mutation and returns the new manifest. Pages of documents that have
//! since been removed are dropped before the mutation.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use pdf_merger_core::{Detection, DocumentId, PageId, PageManifest, PageSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::helpers::RouteResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ManifestResponse {
    success: bool,
    pages: Vec<PageSummary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildRequest {
    #[serde(default)]
    document_ids: Vec<DocumentId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReorderRequest {
    manifest: PageManifest,
    order: Vec<PageId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PageRequest {
    manifest: PageManifest,
    page_id: PageId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FlagsRequest {
    manifest: PageManifest,
    detections: Vec<Detection>,
}

fn respond(state: &AppState, manifest: &PageManifest) -> Json<ManifestResponse> {
    Json(ManifestResponse {
        success: true,
        pages: state.merger.summarize(manifest),
    })
}

/// Expand the given documents (all registered ones when none given).
pub async fn build_manifest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BuildRequest>, JsonRejection>,
) -> RouteResult<Json<ManifestResponse>> {
    let Json(request) = payload?;
    let manifest = state.merger.build_manifest(&request.document_ids)?;
    Ok(respond(&state, &manifest))
}

pub async fn reorder_pages(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReorderRequest>, JsonRejection>,
) -> RouteResult<Json<ManifestResponse>> {
    let Json(request) = payload?;
    let manifest = state.merger.prune_manifest(&request.manifest);
    // Pruned pages leave the order too; ids never in the manifest stay and fail.
    let order: Vec<PageId> = request
        .order
        .into_iter()
        .filter(|id| manifest.get(id).is_some() || request.manifest.get(id).is_none())
        .collect();
    let manifest = manifest.reorder(&order)?;
    Ok(respond(&state, &manifest))
}

pub async fn toggle_page(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PageRequest>, JsonRejection>,
) -> RouteResult<Json<ManifestResponse>> {
    let Json(request) = payload?;
    let manifest = state.merger.prune_manifest(&request.manifest).toggle(&request.page_id)?;
    Ok(respond(&state, &manifest))
}

pub async fn rotate_page(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PageRequest>, JsonRejection>,
) -> RouteResult<Json<ManifestResponse>> {
    let Json(request) = payload?;
    let manifest = state.merger.prune_manifest(&request.manifest).rotate(&request.page_id)?;
    Ok(respond(&state, &manifest))
}

pub async fn remove_page(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PageRequest>, JsonRejection>,
) -> RouteResult<Json<ManifestResponse>> {
    let Json(request) = payload?;
    let manifest = state.merger.prune_manifest(&request.manifest).remove(&request.page_id)?;
    Ok(respond(&state, &manifest))
}

pub async fn apply_flags(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FlagsRequest>, JsonRejection>,
) -> RouteResult<Json<ManifestResponse>> {
    let Json(request) = payload?;
    let manifest = state
        .merger
        .prune_manifest(&request.manifest)
        .apply_detection_flags(&request.detections);
    Ok(respond(&state, &manifest))
}
