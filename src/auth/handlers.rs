use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
            TokenResponse, UpdateDetailsRequest, UpdatePasswordRequest,
        },
        form::{ApiJson, ProfileForm},
        jwt::{AuthUser, TOKEN_COOKIE},
        services,
    },
    error::AppError,
    images::services as images,
    state::AppState,
    users::{
        dto::{DataResponse, PublicUser},
        repo_types::DEFAULT_PROFILE_IMAGE,
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", get(logout))
        .route("/auth/me", get(get_me))
        .route("/auth/updatedetails", put(update_details))
        .route("/auth/updatepassword", put(update_password))
        .route("/auth/forgotpassword", post(forgot_password))
        .route("/auth/resetpassword/:resettoken", put(reset_password))
}

fn session_cookie(state: &AppState, token: &str) -> String {
    let max_age = state.config.jwt.cookie_expire_days * 24 * 60 * 60;
    let mut cookie = format!("{TOKEN_COOKIE}={token}; Path=/; Max-Age={max_age}; HttpOnly");
    if state.config.production {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Token in the body and in the session cookie.
fn token_response(state: &AppState, token: String) -> Response {
    let cookie = session_cookie(state, &token);
    (
        [(header::SET_COOKIE, cookie)],
        Json(TokenResponse {
            success: true,
            token,
        }),
    )
        .into_response()
}

#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    form: ProfileForm<RegisterRequest>,
) -> Result<Response, AppError> {
    let ProfileForm {
        fields: mut payload,
        image,
    } = form;
    services::validate_registration(&mut payload)?;

    let profile_image = match image {
        Some(upload) => {
            Some(images::stage_new_user_image(&state, &payload.user_name, upload).await?)
        }
        None => None,
    };

    match services::register(&state, payload, profile_image.clone()).await {
        Ok((_, token)) => Ok(token_response(&state, token)),
        Err(e) => {
            if let Some(name) = &profile_image {
                images::discard(&state, name).await;
            }
            Err(e)
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Response, AppError> {
    let (_, token) = services::login(&state, payload).await?;
    Ok(token_response(&state, token))
}

/// Overwrites the session cookie; the token itself stays valid until it expires.
pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, format!("{TOKEN_COOKIE}=none; Path=/; Max-Age=10; HttpOnly"))],
        Json(json!({ "success": true, "data": {} })),
    )
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<DataResponse<PublicUser>>, AppError> {
    let user = services::current_user(&state, user_id).await?;
    Ok(Json(DataResponse::ok(user.into())))
}

#[instrument(skip(state, form))]
pub async fn update_details(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    form: ProfileForm<UpdateDetailsRequest>,
) -> Result<Json<DataResponse<PublicUser>>, AppError> {
    let ProfileForm {
        fields: mut payload,
        image,
    } = form;
    services::validate_details(&mut payload)?;
    if let Some(name) = &payload.user_name {
        services::ensure_user_name_free(&state, user_id, name).await?;
    }

    // Only a freshly named object is removed if the update fails; an
    // overwritten one has no previous version to restore.
    let mut staged = None;
    if let Some(upload) = image {
        let current = services::current_user(&state, user_id).await?;
        let name =
            images::stage_profile_image(&state, user_id, &current.profile_image, upload).await?;
        let fresh = current.profile_image == DEFAULT_PROFILE_IMAGE;
        staged = Some((name, fresh));
    }

    let profile_image = staged.as_ref().map(|(name, _)| name.clone());
    match services::update_details(&state, user_id, payload, profile_image).await {
        Ok(user) => Ok(Json(DataResponse::ok(user.into()))),
        Err(e) => {
            if let Some((name, true)) = &staged {
                images::discard(&state, name).await;
            }
            Err(e)
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<UpdatePasswordRequest>,
) -> Result<Response, AppError> {
    let (_, token) = services::update_password(&state, user_id, payload).await?;
    Ok(token_response(&state, token))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    services::forgot_password(&state, payload).await?;
    Ok(Json(json!({ "success": true, "data": "Email sent" })))
}

#[instrument(skip(state, reset_token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(reset_token): Path<String>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> Result<Response, AppError> {
    let (_, token) = services::reset_password(&state, &reset_token, payload).await?;
    Ok(token_response(&state, token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_attributes() {
        let state = AppState::fake();
        assert_eq!(
            session_cookie(&state, "abc"),
            "token=abc; Path=/; Max-Age=2592000; HttpOnly"
        );

        let state = state.with_config(|c| c.production = true);
        assert!(session_cookie(&state, "abc").ends_with("; HttpOnly; Secure"));
    }

    fn png(body: &'static [u8]) -> images::ImageUpload {
        images::ImageUpload {
            file_name: "me.png".into(),
            content_type: "image/png".into(),
            body: bytes::Bytes::from_static(body),
        }
    }

    #[tokio::test]
    async fn taken_user_name_leaves_existing_image_untouched() {
        let (state, storage) = AppState::fake_with_storage();
        let (alice, _) = services::register(&state, registration("alice_1", "a@b.com"), None)
            .await
            .unwrap();
        services::register(&state, registration("bob", "bob@b.com"), None)
            .await
            .unwrap();

        let name = images::stage_profile_image(&state, alice.id, DEFAULT_PROFILE_IMAGE, png(b"old"))
            .await
            .unwrap();
        services::update_details(
            &state,
            alice.id,
            UpdateDetailsRequest {
                user_name: None,
                phone_number: None,
            },
            Some(name),
        )
        .await
        .unwrap();
        let key = storage.keys().pop().expect("image stored");

        let err = update_details(
            State(state.clone()),
            AuthUser(alice.id),
            ProfileForm {
                fields: UpdateDetailsRequest {
                    user_name: Some("bob".into()),
                    phone_number: None,
                },
                image: Some(png(b"new")),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::DuplicateUserName));

        assert_eq!(storage.keys(), vec![key.clone()]);
        let (body, _) = storage.get(&key).unwrap();
        assert_eq!(&body[..], b"old");
    }

    fn registration(user_name: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            user_name: user_name.into(),
            email: email.into(),
            phone_number: None,
            password: "secret1".into(),
            role: None,
        }
    }
}
