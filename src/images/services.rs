use anyhow::Context;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ValidationError},
    state::AppState,
};

lazy_static! {
    static ref IMAGE_ID_RE: Regex = Regex::new(
        r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.(?:jpg|png|webp|heic)$"
    )
    .unwrap();
}

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredImage {
    pub image_id: String,
    pub image_url: String,
}

/// Stores one image for `user_id` and returns its id and public URL.
pub async fn upload_image(
    st: &AppState,
    user_id: Uuid,
    item: UploadItem,
) -> Result<StoredImage, ApiError> {
    let content_type = normalize_mime(&item.content_type);
    let ext = ext_from_mime(&content_type)
        .ok_or_else(|| ValidationError::UnsupportedImageType(content_type.clone()))?;

    let max = st.config.storage.max_image_bytes;
    if item.body.len() > max {
        return Err(ApiError::PayloadTooLarge { max });
    }
    if !content_matches(&content_type, &item.body) {
        return Err(ValidationError::ImageContentMismatch.into());
    }

    let image_id = format!("{}.{}", Uuid::new_v4(), ext);
    let key = object_key(user_id, &image_id);
    st.storage
        .put_object(&key, item.body, &content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    info!(%user_id, %image_id, "image stored");
    Ok(StoredImage {
        image_url: public_url(&st.config.storage.public_base_url, user_id, &image_id),
        image_id,
    })
}

pub async fn delete_image(st: &AppState, user_id: Uuid, image_id: &str) -> anyhow::Result<()> {
    let key = object_key(user_id, image_id);
    st.storage
        .delete_object(&key)
        .await
        .with_context(|| format!("delete_object {}", key))
}

/// Deletes one of the caller's images on request. Images still attached to
/// a food record are refused so no record is left with a dangling URL.
pub async fn delete_unused_image(
    st: &AppState,
    user_id: Uuid,
    image_id: &str,
) -> Result<(), ApiError> {
    validate_image_id(image_id)?;
    let refs = st.foods.image_references(user_id, image_id).await?;
    if refs > 0 {
        warn!(%user_id, %image_id, refs, "refusing to delete image in use");
        return Err(ApiError::ImageInUse);
    }
    delete_image(st, user_id, image_id).await?;
    Ok(())
}

/// Deletes an image whose record is already gone; failures only leave an
/// orphaned object behind, so they are logged.
pub async fn delete_image_best_effort(st: &AppState, user_id: Uuid, image_id: &str) {
    if let Err(e) = delete_image(st, user_id, image_id).await {
        warn!(error = ?e, %user_id, %image_id, "failed to delete image");
    }
}

pub fn validate_image_id(image_id: &str) -> Result<(), ValidationError> {
    if IMAGE_ID_RE.is_match(image_id) {
        Ok(())
    } else {
        Err(ValidationError::InvalidImageId)
    }
}

/// Objects are namespaced per user, so an id only ever resolves inside the
/// caller's own prefix.
pub fn object_key(user_id: Uuid, image_id: &str) -> String {
    format!("foods/{}/{}", user_id, image_id)
}

pub fn public_url(base: &str, user_id: Uuid, image_id: &str) -> String {
    format!("{}/{}", base, object_key(user_id, image_id))
}

fn normalize_mime(ct: &str) -> String {
    ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" | "image/heif" => Some("heic"),
        _ => None,
    }
}

/// Checks the file signature against the declared type.
fn content_matches(ct: &str, body: &[u8]) -> bool {
    match ext_from_mime(ct) {
        Some("jpg") => body.starts_with(&[0xFF, 0xD8, 0xFF]),
        Some("png") => body.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
        Some("webp") => body.len() >= 12 && &body[0..4] == b"RIFF" && &body[8..12] == b"WEBP",
        Some("heic") => {
            body.len() >= 12
                && &body[4..8] == b"ftyp"
                && matches!(
                    &body[8..12],
                    b"heic" | b"heix" | b"hevc" | b"heim" | b"heis" | b"mif1" | b"msf1"
                )
        }
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod samples {
    pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
}
