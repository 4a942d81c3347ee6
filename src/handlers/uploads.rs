use axum::{extract::Multipart, response::Json, Extension};
use serde_json::{json, Value};
use std::path::Path as FsPath;
use uuid::Uuid;

use crate::config;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;

/// POST /api/uploads/image - Store an image for prompt outputs.
///
/// Extension allowlist and size cap are enforced before anything touches
/// disk; files land under the configured uploads dir with a UUID name.
pub async fn image(
    Extension(_auth): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let uploads = &config::config().uploads;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Missing filename"))?;

        let extension = FsPath::new(&original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if !uploads.allowed_extensions.contains(&extension) {
            return Err(ApiError::bad_request(format!(
                "File type not allowed. Allowed types: {}",
                uploads.allowed_extensions.join(", ")
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;

        if data.len() > uploads.max_file_bytes {
            return Err(ApiError::bad_request(format!(
                "File too large. Maximum size: {}MB",
                uploads.max_file_bytes / (1024 * 1024)
            )));
        }

        let unique_filename = format!("{}.{}", Uuid::new_v4(), extension);
        let dir = FsPath::new(&uploads.dir);
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            tracing::error!("Failed to create uploads dir: {}", e);
            ApiError::internal_server_error("Failed to save file")
        })?;
        tokio::fs::write(dir.join(&unique_filename), &data)
            .await
            .map_err(|e| {
                tracing::error!("Failed to write upload: {}", e);
                ApiError::internal_server_error("Failed to save file")
            })?;

        return Ok(Json(json!({
            "url": format!("/static/uploads/{}", unique_filename),
            "filename": unique_filename,
            "message": "Image uploaded successfully",
        })));
    }

    Err(ApiError::bad_request("Missing 'file' field"))
}
