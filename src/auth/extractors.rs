use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{auth::jwt::AuthUser, error::AppError, state::AppState};

/// Authenticated caller whose record still exists, with the admin decision
/// taken from configuration.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    pub is_admin: bool,
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;

        let user = state.store.find_by_id(user_id).await?.ok_or_else(|| {
            warn!(%user_id, "token for missing user");
            AppError::Unauthenticated
        })?;

        let is_admin = state.config.is_admin_email(&user.email);
        debug!(%user_id, is_admin, "caller resolved");
        Ok(Caller { user_id, is_admin })
    }
}
