use std::path::Path;

use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{error::AppError, state::AppState, users::repo_types::DEFAULT_PROFILE_IMAGE};

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

pub fn validate(upload: &ImageUpload, max_bytes: usize) -> Result<(), AppError> {
    if !upload.content_type.starts_with("image") {
        return Err(AppError::UploadWrongType);
    }
    if upload.body.len() > max_bytes {
        return Err(AppError::UploadTooLarge { max_bytes });
    }
    Ok(())
}

/// Stores the image for a user being registered; returns the reference to
/// save on the record.
pub async fn stage_new_user_image(
    st: &AppState,
    user_name: &str,
    upload: ImageUpload,
) -> Result<String, AppError> {
    validate(&upload, st.config.uploads.max_file_upload_bytes)?;
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let name = format!("photo_{}_{}{}", user_name, millis, extension(&upload));
    put(st, &name, upload).await?;
    Ok(name)
}

/// Stores a replacement profile image. Users still on the default image get
/// a name derived from their id; otherwise the existing object is overwritten.
pub async fn stage_profile_image(
    st: &AppState,
    user_id: Uuid,
    current: &str,
    upload: ImageUpload,
) -> Result<String, AppError> {
    validate(&upload, st.config.uploads.max_file_upload_bytes)?;
    let name = if current.is_empty() || current == DEFAULT_PROFILE_IMAGE {
        format!("photo_{}{}", user_id, extension(&upload))
    } else {
        current.to_string()
    };
    put(st, &name, upload).await?;
    Ok(name)
}

/// Best-effort removal of an image staged for a request that then failed.
pub async fn discard(st: &AppState, name: &str) {
    let key = object_key(st, name);
    if let Err(e) = st.storage.delete_object(&key).await {
        warn!(error = %e, %key, "failed to discard staged image");
    }
}

async fn put(st: &AppState, name: &str, upload: ImageUpload) -> Result<(), AppError> {
    let key = object_key(st, name);
    st.storage
        .put_object(&key, upload.body, &upload.content_type)
        .await
        .map_err(AppError::UploadFailed)?;
    info!(%key, "profile image stored");
    Ok(())
}

fn object_key(st: &AppState, name: &str) -> String {
    format!("{}/{}", st.config.uploads.path.trim_end_matches('/'), name)
}

fn extension(upload: &ImageUpload) -> String {
    Path::new(&upload.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .or_else(|| ext_from_mime(&upload.content_type))
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}
