//! Application error type and its JSON rendering.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::users::repo::{StoreError, UniqueField};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    ValidationFailed(String),

    #[error("User Name already taken! Change the User Name")]
    DuplicateUserName,

    #[error("Email address already exists!")]
    DuplicateEmail,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Your account is not active please contact support!")]
    AccountInactive,

    #[error("Not authorized to access this route")]
    Unauthenticated,

    #[error("Session expired, please log in again")]
    TokenExpired,

    #[error("Invalid session token")]
    TokenInvalid,

    #[error("User is not authorized to access this route")]
    Forbidden,

    #[error("Password is incorrect")]
    IncorrectCurrentPassword,

    #[error("User not found")]
    NotFound,

    #[error("{0}")]
    AlreadyInState(&'static str),

    #[error("Problem with file upload")]
    UploadFailed(#[source] anyhow::Error),

    #[error("Image size (maximum {max_bytes} bytes allowed) is too large")]
    UploadTooLarge { max_bytes: usize },

    #[error("Please upload a valid image file")]
    UploadWrongType,

    #[error("Invalid reset token")]
    ResetTokenInvalid,

    #[error("Reset token has expired")]
    ResetTokenExpired,

    #[error("stored credential is corrupt")]
    CorruptCredential,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationFailed(_)
            | AppError::AlreadyInState(_)
            | AppError::ResetTokenInvalid
            | AppError::ResetTokenExpired => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::AccountInactive
            | AppError::Unauthenticated
            | AppError::TokenExpired
            | AppError::TokenInvalid
            | AppError::IncorrectCurrentPassword => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::DuplicateUserName | AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UploadWrongType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::UploadFailed(_) | AppError::CorruptCredential | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the caller.
    pub fn public_message(&self) -> String {
        match self {
            AppError::CorruptCredential | AppError::Internal(_) => "Server Error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(UniqueField::UserName) => AppError::DuplicateUserName,
            StoreError::Duplicate(UniqueField::Email) => AppError::DuplicateEmail,
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        }
        let body = json!({
            "success": false,
            "message": self.public_message(),
        });
        (status, Json(body)).into_response()
    }
}
