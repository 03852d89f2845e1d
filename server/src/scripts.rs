use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::{
    archive::ZipSink,
    error::{ApiError, StoreError},
    store::{self, Category, ScriptStore},
    SharedState,
};

/// Runs a store operation on the blocking pool; every store call touches
/// the filesystem.
pub async fn on_store<T, F>(state: &SharedState, op: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&ScriptStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
}

// -------------------------------------------
// Listing
// -------------------------------------------

/// GET /api/scripts
pub async fn list(State(state): State<SharedState>) -> Result<Json<Vec<Category>>, ApiError> {
    on_store(&state, |store| store.list()).await.map(Json).map_err(|e| {
        error!("Listing failed: {}", e);
        ApiError::Internal("Failed to list scripts")
    })
}

// -------------------------------------------
// Raw content
// -------------------------------------------

/// GET /api/raw/*path and its /raw/*path alias.
pub async fn raw(State(state): State<SharedState>, Path(path): Path<String>) -> Response {
    let identifier = path.clone();
    match on_store(&state, move |store| store.read(&identifier)).await {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(StoreError::NotFound) | Err(StoreError::Security) => {
            (StatusCode::NOT_FOUND, "File not found").into_response()
        }
        Err(e) => {
            error!("Reading {} failed: {}", path, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
        }
    }
}

// --------------------------------------------
// CREATE / UPDATE
// --------------------------------------------

/// Fields accepted by the upload form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub category: Option<String>,
    pub filename: Option<String>,
    pub content: Option<String>,
    pub file: Option<UploadedFile>,
}

#[derive(Debug)]
pub struct UploadedFile {
    pub name: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| ApiError::BadRequest("Malformed form data"))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let file_name = field.file_name().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|_| ApiError::BadRequest("Malformed form data"))?;
                    form.file = Some(UploadedFile {
                        name: file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                "category" | "filename" | "content" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|_| ApiError::BadRequest("Malformed form data"))?;
                    match name.as_str() {
                        "category" => form.category = Some(text),
                        "filename" => form.filename = Some(text),
                        _ => form.content = Some(text),
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// Target identifier and text to store, or the first validation failure.
    pub fn into_target(self) -> Result<(String, String), ApiError> {
        let filename = self
            .filename
            .filter(|f| !f.trim().is_empty())
            .or_else(|| {
                self.file
                    .as_ref()
                    .and_then(|f| f.name.clone())
                    .filter(|n| !n.trim().is_empty())
            })
            .ok_or(ApiError::BadRequest("Filename required"))?;

        let text = match (self.file, self.content) {
            (Some(file), _) => String::from_utf8_lossy(&file.bytes).into_owned(),
            (None, Some(content)) if !content.is_empty() => content,
            _ => return Err(ApiError::BadRequest("Content required")),
        };

        Ok((
            store::target_path(self.category.as_deref(), filename.trim()),
            text,
        ))
    }
}

/// POST /api/scripts
pub async fn create(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;
    let (target, text) = form.into_target()?;

    let size = text.len();
    let identifier = target.clone();
    match on_store(&state, move |store| store.write(&identifier, &text)).await {
        Ok(()) => {
            info!("Saved {} ({} bytes)", target, size);
            Ok(Json(json!({ "success": true })))
        }
        Err(e) => {
            warn!("Save of {} rejected: {}", target, e);
            Err(ApiError::Internal("Failed to save"))
        }
    }
}

// --------------------------------------------
// DELETE
// --------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

/// DELETE /api/scripts?path=...
pub async fn delete(
    State(state): State<SharedState>,
    Query(q): Query<PathQuery>,
) -> Result<Json<Value>, ApiError> {
    let path = q
        .path
        .filter(|p| !p.is_empty())
        .ok_or(ApiError::BadRequest("Path required"))?;

    let identifier = path.clone();
    match on_store(&state, move |store| store.delete(&identifier)).await {
        Ok(()) => {
            info!("Deleted {}", path);
            Ok(Json(json!({ "success": true })))
        }
        Err(e) => {
            warn!("Delete of {} rejected: {}", path, e);
            Err(ApiError::Internal("Failed to delete"))
        }
    }
}

// --------------------------------------------
// Archive export
// --------------------------------------------

/// GET /api/download
pub async fn download(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let bytes = on_store(&state, |store| {
        let mut sink = ZipSink::new();
        let count = store.export(&mut sink)?;
        sink.finish().map(|bytes| (count, bytes))
    })
    .await
    .map(|(count, bytes)| {
        info!("Exported {} scripts ({} bytes)", count, bytes.len());
        bytes
    })
    .map_err(|e| {
        error!("Archive export failed: {}", e);
        ApiError::Internal("Failed to create archive")
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"scripts.zip\"".to_string(),
            ),
        ],
        Body::from(bytes),
    )
        .into_response())
}
