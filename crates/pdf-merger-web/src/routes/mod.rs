//! HTTP route handlers for the PDF merger web application.
//!
//! All routes speak JSON except the two binary endpoints (source files and
//! merged downloads). Errors render through [`crate::helpers::ApiError`].

mod cleanup;
mod documents;
mod download;
mod manifest;
mod merge;
mod upload;

pub use cleanup::{cleanup, health};
pub use documents::{detect_blanks, get_file};
pub use download::download_pdf;
pub use manifest::{apply_flags, build_manifest, remove_page, reorder_pages, rotate_page, toggle_page};
pub use merge::merge_pdfs;
pub use upload::upload_pdfs;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::state::AppState;

/// The `/api/pdf` router, without middleware.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/pdf/upload", post(upload_pdfs))
        .route("/api/pdf/file/{id}", get(get_file))
        .route("/api/pdf/manifest", post(build_manifest))
        .route("/api/pdf/manifest/reorder", post(reorder_pages))
        .route("/api/pdf/manifest/toggle", post(toggle_page))
        .route("/api/pdf/manifest/rotate", post(rotate_page))
        .route("/api/pdf/manifest/remove", post(remove_page))
        .route("/api/pdf/manifest/flags", post(apply_flags))
        .route("/api/pdf/detect-blanks", post(detect_blanks))
        .route("/api/pdf/merge", post(merge_pdfs))
        .route("/api/pdf/download/{artifact_id}", get(download_pdf))
        .route("/api/pdf/cleanup", post(cleanup))
        .route("/api/pdf/health", get(health))
        .with_state(state)
}
