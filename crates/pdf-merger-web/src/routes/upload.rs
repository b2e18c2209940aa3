//! Upload route - multipart PDF upload handling.

use axum::{Json, extract::State};
use axum_extra::extract::Multipart;
use pdf_merger_core::{DocumentSummary, UploadFailure, UploadedFile};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::helpers::{ApiError, ResultExt, RouteResult, blocking};
use crate::state::AppState;

/// Multipart field names accepted as files.
const FILE_FIELDS: [&str; 2] = ["files", "file"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    success: bool,
    files: Vec<DocumentSummary>,
    errors: Vec<UploadFailure>,
}

/// Register every uploaded file, reporting an outcome per file.
///
/// The batch succeeds when at least one file was registered.
pub async fn upload_pdfs(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> RouteResult<Json<UploadResponse>> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.or_bad_request()? {
        if !field.name().is_some_and(|name| FILE_FIELDS.contains(&name)) {
            continue;
        }
        let name = field.file_name().unwrap_or("document.pdf").to_string();
        let content = field.bytes().await.or_bad_request()?;
        debug!("Received {} ({} bytes)", name, content.len());

        files.push(UploadedFile {
            name,
            content: content.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(ApiError::bad_request("No files uploaded"));
    }

    let report = blocking(move || state.merger.upload(files)).await?;
    info!(
        "Upload: {} accepted, {} rejected",
        report.files.len(),
        report.errors.len()
    );

    Ok(Json(UploadResponse {
        success: !report.files.is_empty(),
        files: report.files,
        errors: report.errors,
    }))
}
