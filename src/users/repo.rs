use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, User, UserChanges, DEFAULT_PROFILE_IMAGE};

/// Columns with a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    UserName,
    Email,
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UniqueField::UserName => f.write_str("user_name"),
            UniqueField::Email => f.write_str("email"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate value for {0}")]
    Duplicate(UniqueField),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                match db.constraint() {
                    Some("users_user_name_key") => {
                        return StoreError::Duplicate(UniqueField::UserName)
                    }
                    Some("users_email_key") => return StoreError::Duplicate(UniqueField::Email),
                    _ => {}
                }
            }
        }
        StoreError::Backend(err.into())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListQuery {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub total: i64,
    pub items: Vec<User>,
}

/// Persistence for user records. Uniqueness of `user_name` and `email` is
/// enforced at write time by every implementation.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Matches `identifier` against either `user_name` or `email`.
    async fn find_by_login(&self, identifier: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_user_name(&self, user_name: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_reset_hash(&self, token_hash: &str) -> Result<Option<User>, StoreError>;
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError>;
    /// Stores `password_hash` and clears the reset fields, but only while the
    /// record still holds `expected_hash`. `None` means the token was already
    /// consumed or replaced.
    async fn consume_reset(
        &self,
        id: Uuid,
        expected_hash: &str,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn list(&self, query: ListQuery) -> Result<Page, StoreError>;
}

const USER_COLUMNS: &str = "id, user_name, email, phone_number, role, is_active, profile_image, \
     password_hash, reset_password_token, reset_password_expire, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_where(&self, clause: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_login(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        self.find_where("email = $1 OR user_name = $1", identifier).await
    }

    async fn find_by_user_name(&self, user_name: &str) -> Result<Option<User>, StoreError> {
        self.find_where("user_name = $1", user_name).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_where("email = $1", email).await
    }

    async fn find_by_reset_hash(&self, token_hash: &str) -> Result<Option<User>, StoreError> {
        self.find_where("reset_password_token = $1", token_hash).await
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, user_name, email, phone_number, role, profile_image, password_hash)
            VALUES ($1, $2, $3, $4, 'user', $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.user_name)
            .bind(&user.email)
            .bind(&user.phone_number)
            .bind(
                user.profile_image
                    .as_deref()
                    .unwrap_or(DEFAULT_PROFILE_IMAGE),
            )
            .bind(&user.password_hash)
            .fetch_one(&self.db)
            .await?;
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let (set_reset, reset) = match changes.reset {
            Some(fields) => (true, fields),
            None => (false, None),
        };
        let sql = format!(
            r#"
            UPDATE users SET
                user_name = COALESCE($2, user_name),
                phone_number = COALESCE($3, phone_number),
                profile_image = COALESCE($4, profile_image),
                is_active = COALESCE($5, is_active),
                password_hash = COALESCE($6, password_hash),
                reset_password_token = CASE WHEN $7 THEN $8 ELSE reset_password_token END,
                reset_password_expire = CASE WHEN $7 THEN $9 ELSE reset_password_expire END
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.user_name)
            .bind(changes.phone_number)
            .bind(changes.profile_image)
            .bind(changes.is_active)
            .bind(changes.password_hash)
            .bind(set_reset)
            .bind(reset.as_ref().map(|r| r.token_hash.clone()))
            .bind(reset.as_ref().map(|r| r.expires_at))
            .fetch_optional(&self.db)
            .await?;
        Ok(updated)
    }

    async fn consume_reset(
        &self,
        id: Uuid,
        expected_hash: &str,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users SET
                password_hash = $3,
                reset_password_token = NULL,
                reset_password_expire = NULL
            WHERE id = $1 AND reset_password_token = $2
            RETURNING {USER_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(expected_hash)
            .bind(password_hash)
            .fetch_optional(&self.db)
            .await?;
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, query: ListQuery) -> Result<Page, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        let items = sqlx::query_as::<_, User>(&sql)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.db)
            .await?;
        Ok(Page { total, items })
    }
}
