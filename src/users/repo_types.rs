use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_PROFILE_IMAGE: &str = "no-photo.jpg";

/// Closed set of roles a record may carry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("`{0}` is not a valid role")]
pub struct InvalidRole(pub String);

impl std::str::FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = InvalidRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub user_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
    pub profile_image: String,
    #[serde(skip_serializing)]
    pub password_hash: String,       // Argon2 PHC string, never exposed
    #[serde(skip_serializing)]
    pub reset_password_token: Option<String>, // SHA-256 hex of the outstanding reset token
    #[serde(skip_serializing)]
    pub reset_password_expire: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Fields supplied when creating a record.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub profile_image: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetFields {
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

/// Partial update; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub user_name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_image: Option<String>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
    /// `Some(None)` clears an outstanding reset token.
    pub reset: Option<Option<ResetFields>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.user_name.is_none()
            && self.phone_number.is_none()
            && self.profile_image.is_none()
            && self.is_active.is_none()
            && self.password_hash.is_none()
            && self.reset.is_none()
    }
}
