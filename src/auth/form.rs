use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::{header, StatusCode},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::{error::AppError, images::services::ImageUpload, state::AppState};

/// Multipart field carrying the profile picture.
pub const PROFILE_IMAGE_FIELD: &str = "profileImage";

/// Profile-bearing request body, sent either as JSON or as
/// `multipart/form-data` whose text parts carry the same fields as the JSON
/// object and whose `profileImage` part carries an optional picture.
pub struct ProfileForm<T> {
    pub fields: T,
    pub image: Option<ImageUpload>,
}

/// JSON body whose rejections render as [`AppError`].
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            warn!(error = %e, "json body rejected");
            AppError::ValidationFailed(e.body_text())
        })?;
        Ok(Self(value))
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

#[async_trait]
impl<T> FromRequest<AppState> for ProfileForm<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let ApiJson(fields) = ApiJson::<T>::from_request(req, state).await?;
            return Ok(Self { fields, image: None });
        }

        let max_bytes = state.config.uploads.max_file_upload_bytes;
        let mut mp = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::ValidationFailed(e.body_text()))?;

        let read_err = |e: axum::extract::multipart::MultipartError| {
            warn!(error = %e, "multipart read failed");
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AppError::UploadTooLarge { max_bytes }
            } else {
                AppError::ValidationFailed(e.body_text())
            }
        };

        let mut map = Map::new();
        let mut image = None;
        while let Some(field) = mp.next_field().await.map_err(read_err)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == PROFILE_IMAGE_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field.bytes().await.map_err(read_err)?;
                if !body.is_empty() {
                    image = Some(ImageUpload {
                        file_name,
                        content_type,
                        body,
                    });
                }
            } else {
                let text = field.text().await.map_err(read_err)?;
                map.insert(name, Value::String(text));
            }
        }

        let fields = serde_json::from_value(Value::Object(map))
            .map_err(|e| AppError::ValidationFailed(e.to_string()))?;
        Ok(Self { fields, image })
    }
}
