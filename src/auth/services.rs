//! Registration, login, profile and password flows.
//!
//! Handlers stage uploads and shape HTTP responses; everything here works on
//! plain values and the store, hasher and token keys held by [`AppState`].
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
            UpdateDetailsRequest, UpdatePasswordRequest,
        },
        reset::{self, ResetCheckError},
    },
    error::AppError,
    state::AppState,
    users::{
        repo_types::{NewUser, Role, User, UserChanges},
        validate,
    },
};

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Normalises and validates a registration request in place.
pub fn validate_registration(req: &mut RegisterRequest) -> Result<(), AppError> {
    req.user_name = req.user_name.trim().to_string();
    req.email = req.email.trim().to_lowercase();
    req.phone_number = non_empty(req.phone_number.take());

    validate::user_name(&req.user_name)?;
    validate::email(&req.email)?;
    validate::password(&req.password)?;
    if let Some(phone) = &req.phone_number {
        validate::phone_number(phone)?;
    }
    if let Some(role) = &req.role {
        role.parse::<Role>()
            .map_err(|e| AppError::ValidationFailed(e.to_string()))?;
    }
    Ok(())
}

/// Creates the account and returns it with a fresh session token.
/// `req` must have passed [`validate_registration`].
pub async fn register(
    st: &AppState,
    req: RegisterRequest,
    profile_image: Option<String>,
) -> Result<(User, String), AppError> {
    if st.store.find_by_user_name(&req.user_name).await?.is_some() {
        warn!(user_name = %req.user_name, "user name already taken");
        return Err(AppError::DuplicateUserName);
    }
    if st.store.find_by_email(&req.email).await?.is_some() {
        warn!(email = %req.email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = st.hasher.hash_blocking(req.password).await?;

    // A concurrent registration may still win between the checks and the insert;
    // the store reports that as a duplicate.
    let user = st
        .store
        .insert(NewUser {
            user_name: req.user_name,
            email: req.email,
            phone_number: req.phone_number,
            profile_image,
            password_hash,
        })
        .await?;

    let token = st.jwt.issue_session(user.id)?;
    info!(user_id = %user.id, user_name = %user.user_name, "user registered");
    Ok((user, token))
}

pub async fn login(st: &AppState, req: LoginRequest) -> Result<(User, String), AppError> {
    let identifier = non_empty(req.user_name);
    let password = req.password.filter(|p| !p.is_empty());
    let (Some(identifier), Some(password)) = (identifier, password) else {
        return Err(AppError::ValidationFailed(
            "UserName and password fields must be required".into(),
        ));
    };
    let identifier = if identifier.contains('@') {
        identifier.to_lowercase()
    } else {
        identifier
    };

    let Some(user) = st.store.find_by_login(&identifier).await? else {
        // Same hashing cost as a wrong password.
        st.hasher.verify_dummy_blocking(password).await?;
        warn!(%identifier, "login unknown identifier");
        return Err(AppError::InvalidCredentials);
    };

    if !st
        .hasher
        .verify_blocking(password, user.password_hash.clone())
        .await?
    {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    if !user.is_active {
        warn!(user_id = %user.id, "login on inactive account");
        return Err(AppError::AccountInactive);
    }

    let token = st.jwt.issue_session(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, token))
}

/// Record of the session holder. A token for a deleted account is treated
/// as unauthenticated.
pub async fn current_user(st: &AppState, user_id: Uuid) -> Result<User, AppError> {
    st.store
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::Unauthenticated)
}

/// Normalises and validates a profile update in place.
pub fn validate_details(req: &mut UpdateDetailsRequest) -> Result<(), AppError> {
    req.user_name = non_empty(req.user_name.take());
    req.phone_number = non_empty(req.phone_number.take());
    if let Some(name) = &req.user_name {
        validate::user_name(name)?;
    }
    if let Some(phone) = &req.phone_number {
        validate::phone_number(phone)?;
    }
    Ok(())
}

/// Fails with [`AppError::DuplicateUserName`] when `name` belongs to an
/// account other than `user_id`.
pub async fn ensure_user_name_free(
    st: &AppState,
    user_id: Uuid,
    name: &str,
) -> Result<(), AppError> {
    match st.store.find_by_user_name(name).await? {
        Some(other) if other.id != user_id => {
            warn!(%user_id, user_name = %name, "user name already taken");
            Err(AppError::DuplicateUserName)
        }
        _ => Ok(()),
    }
}

/// Applies a validated profile update. `profile_image` is a reference already
/// produced by image intake.
pub async fn update_details(
    st: &AppState,
    user_id: Uuid,
    req: UpdateDetailsRequest,
    profile_image: Option<String>,
) -> Result<User, AppError> {
    if let Some(name) = &req.user_name {
        ensure_user_name_free(st, user_id, name).await?;
    }

    let changes = UserChanges {
        user_name: req.user_name,
        phone_number: req.phone_number,
        profile_image,
        ..Default::default()
    };
    if changes.is_empty() {
        return current_user(st, user_id).await;
    }

    let user = st
        .store
        .update(user_id, changes)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(%user_id, "user details updated");
    Ok(user)
}

pub async fn update_password(
    st: &AppState,
    user_id: Uuid,
    req: UpdatePasswordRequest,
) -> Result<(User, String), AppError> {
    let user = current_user(st, user_id).await?;

    if !st
        .hasher
        .verify_blocking(req.current_password, user.password_hash.clone())
        .await?
    {
        warn!(%user_id, "password change with incorrect current password");
        return Err(AppError::IncorrectCurrentPassword);
    }
    if !user.is_active {
        warn!(%user_id, "password change on inactive account");
        return Err(AppError::AccountInactive);
    }
    validate::password(&req.new_password)?;

    let password_hash = st.hasher.hash_blocking(req.new_password).await?;
    let user = st
        .store
        .update(
            user_id,
            UserChanges {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?
        .ok_or(AppError::NotFound)?;

    let token = st.jwt.issue_session(user.id)?;
    info!(%user_id, "password changed");
    Ok((user, token))
}

/// Issues a reset token for the account with `email`, if any. The outcome is
/// the same whether or not the account exists.
pub async fn forgot_password(st: &AppState, req: ForgotPasswordRequest) -> Result<(), AppError> {
    let email = req.email.trim().to_lowercase();
    validate::email(&email)?;

    let Some(user) = st.store.find_by_email(&email).await? else {
        warn!(%email, "password reset for unknown email");
        return Ok(());
    };

    let token = reset::generate(
        OffsetDateTime::now_utc(),
        Duration::minutes(st.config.reset_ttl_minutes),
    );
    st.store
        .update(
            user.id,
            UserChanges {
                reset: Some(Some(token.fields)),
                ..Default::default()
            },
        )
        .await?
        .ok_or(AppError::NotFound)?;

    let reset_url = format!(
        "{}/api/v1/auth/resetpassword/{}",
        st.config.public_url.trim_end_matches('/'),
        token.plain
    );
    if let Err(e) = st.mailer.send_reset(&user.email, &reset_url).await {
        error!(error = %e, user_id = %user.id, "reset delivery failed");
        st.store
            .update(
                user.id,
                UserChanges {
                    reset: Some(None),
                    ..Default::default()
                },
            )
            .await?;
        return Err(AppError::Internal(e.context("Email could not be sent")));
    }

    info!(user_id = %user.id, "password reset token issued");
    Ok(())
}

/// Consumes `plain_token` and sets the new password in the same store write.
pub async fn reset_password(
    st: &AppState,
    plain_token: &str,
    req: ResetPasswordRequest,
) -> Result<(User, String), AppError> {
    validate::password(&req.password)?;

    let Some(user) = st
        .store
        .find_by_reset_hash(&reset::hash_token(plain_token))
        .await?
    else {
        warn!("reset with unknown or consumed token");
        return Err(AppError::ResetTokenInvalid);
    };

    let stored_hash =
        reset::check(&user, plain_token, OffsetDateTime::now_utc()).map_err(|e| {
            warn!(user_id = %user.id, error = %e, "reset token rejected");
            match e {
                ResetCheckError::Expired => AppError::ResetTokenExpired,
                ResetCheckError::NotIssued | ResetCheckError::Mismatch => {
                    AppError::ResetTokenInvalid
                }
            }
        })?;
    if !user.is_active {
        warn!(user_id = %user.id, "reset on inactive account");
        return Err(AppError::AccountInactive);
    }

    let password_hash = st.hasher.hash_blocking(req.password).await?;
    let user = st
        .store
        .consume_reset(user.id, &stored_hash, &password_hash)
        .await?
        .ok_or(AppError::ResetTokenInvalid)?;
    // Blocked between the lookup and the write: keep the new password, no session.
    if !user.is_active {
        warn!(user_id = %user.id, "account blocked during reset");
        return Err(AppError::AccountInactive);
    }

    let token = st.jwt.issue_session(user.id)?;
    info!(user_id = %user.id, "password reset");
    Ok((user, token))
}
