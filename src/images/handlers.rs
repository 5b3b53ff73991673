use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::services::{self, StoredImage, UploadItem};
use crate::{
    auth::AuthUser,
    error::{ApiError, ValidationError},
    extract::ApiPath,
    state::AppState,
};

/// Headroom for multipart framing on top of the image itself.
pub(crate) const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn image_routes(max_image_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/images", post(upload_image))
        .route("/images/:image_id", delete(delete_image))
        .layer(DefaultBodyLimit::max(max_image_bytes + MULTIPART_OVERHEAD))
}

/// POST /images (multipart, field `file`)
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn upload_image(
    State(state): State<AppState>,
    user: AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<StoredImage>), ApiError> {
    let mut mp = mp.map_err(|e| ValidationError::Malformed(e.body_text()))?;
    let max = state.config.storage.max_image_bytes;

    let mut upload = None;
    while let Some(field) = mp.next_field().await.map_err(|e| multipart_error(e, max))? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field.bytes().await.map_err(|e| multipart_error(e, max))?;
        upload = Some(UploadItem { body, content_type });
        break;
    }
    let upload = upload.ok_or(ValidationError::MissingFile)?;

    let stored = services::upload_image(&state, user.id, upload).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// DELETE /images/:image_id
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_image(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(image_id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    services::delete_unused_image(&state, user.id, &image_id).await?;
    info!(%image_id, "image deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn multipart_error(e: axum::extract::multipart::MultipartError, max: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { max }
    } else {
        ValidationError::Malformed(e.body_text()).into()
    }
}
