use std::path::Path;

use uuid::Uuid;

use crate::{
    audit,
    dto::upload::UploadResponse,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Lower-cased extension of `filename` if it is an accepted image type.
pub fn image_extension(filename: &str) -> AppResult<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| AppError::BadRequest("File has no extension".into()))?;

    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Only {} images are allowed",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    Ok(ext)
}

/// Random name for a stored file; the client's name is never reused.
pub fn stored_name(ext: &str) -> String {
    format!("{}.{}", Uuid::new_v4(), ext)
}

pub async fn save_image(
    state: &AppState,
    user: &AuthUser,
    original_name: &str,
    bytes: &[u8],
) -> AppResult<ApiResponse<UploadResponse>> {
    ensure_admin(user)?;
    let ext = image_extension(original_name)?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("File is empty".into()));
    }
    if bytes.len() > state.config.upload_max_bytes {
        return Err(AppError::BadRequest(format!(
            "File exceeds {} bytes",
            state.config.upload_max_bytes
        )));
    }

    let filename = stored_name(&ext);
    let dir = Path::new(&state.config.upload_dir);
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    tokio::fs::write(dir.join(&filename), bytes)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let url = format!(
        "{}/uploads/{}",
        state.config.public_base_url.trim_end_matches('/'),
        filename
    );

    tracing::info!(filename = %filename, size = bytes.len(), "image uploaded");

    audit::record(
        &state.pool,
        Some(user.user_id),
        "upload_image",
        "uploads",
        serde_json::json!({ "filename": filename, "size": bytes.len() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Uploaded",
        UploadResponse {
            url,
            filename,
            size: bytes.len(),
        },
        Some(Meta::empty()),
    ))
}
