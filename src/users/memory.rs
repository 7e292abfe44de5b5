use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo::{ListQuery, Page, StoreError, UniqueField, UserStore};
use crate::users::repo_types::{NewUser, Role, User, UserChanges, DEFAULT_PROFILE_IMAGE};

/// Process-local store. Every check-then-write runs under one lock, so the
/// uniqueness constraints hold the same way a database constraint would.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_users<T>(
        &self,
        f: impl FnOnce(&mut HashMap<Uuid, User>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self
            .users
            .lock()
            .map_err(|_| StoreError::Backend(anyhow!("user store lock poisoned")))?;
        f(&mut guard)
    }

    fn find_by(&self, pred: impl Fn(&User) -> bool) -> Result<Option<User>, StoreError> {
        self.with_users(|users| Ok(users.values().find(|u| pred(u)).cloned()))
    }
}

fn check_unique(
    users: &HashMap<Uuid, User>,
    except: Option<Uuid>,
    user_name: Option<&str>,
    email: Option<&str>,
) -> Result<(), StoreError> {
    for other in users.values().filter(|u| Some(u.id) != except) {
        if user_name == Some(other.user_name.as_str()) {
            return Err(StoreError::Duplicate(UniqueField::UserName));
        }
        if email == Some(other.email.as_str()) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.with_users(|users| Ok(users.get(&id).cloned()))
    }

    async fn find_by_login(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        self.find_by(|u| u.email == identifier || u.user_name == identifier)
    }

    async fn find_by_user_name(&self, user_name: &str) -> Result<Option<User>, StoreError> {
        self.find_by(|u| u.user_name == user_name)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_by(|u| u.email == email)
    }

    async fn find_by_reset_hash(&self, token_hash: &str) -> Result<Option<User>, StoreError> {
        self.find_by(|u| u.reset_password_token.as_deref() == Some(token_hash))
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        self.with_users(|users| {
            check_unique(users, None, Some(&user.user_name), Some(&user.email))?;
            let created = User {
                id: Uuid::new_v4(),
                user_name: user.user_name,
                email: user.email,
                phone_number: user.phone_number,
                role: Role::User,
                is_active: true,
                profile_image: user
                    .profile_image
                    .unwrap_or_else(|| DEFAULT_PROFILE_IMAGE.to_string()),
                password_hash: user.password_hash,
                reset_password_token: None,
                reset_password_expire: None,
                created_at: OffsetDateTime::now_utc(),
            };
            users.insert(created.id, created.clone());
            Ok(created)
        })
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        self.with_users(|users| {
            if !users.contains_key(&id) {
                return Ok(None);
            }
            check_unique(users, Some(id), changes.user_name.as_deref(), None)?;
            let Some(user) = users.get_mut(&id) else {
                return Ok(None);
            };
            if let Some(v) = changes.user_name {
                user.user_name = v;
            }
            if let Some(v) = changes.phone_number {
                user.phone_number = Some(v);
            }
            if let Some(v) = changes.profile_image {
                user.profile_image = v;
            }
            if let Some(v) = changes.is_active {
                user.is_active = v;
            }
            if let Some(v) = changes.password_hash {
                user.password_hash = v;
            }
            if let Some(reset) = changes.reset {
                user.reset_password_token = reset.as_ref().map(|r| r.token_hash.clone());
                user.reset_password_expire = reset.map(|r| r.expires_at);
            }
            Ok(Some(user.clone()))
        })
    }

    async fn consume_reset(
        &self,
        id: Uuid,
        expected_hash: &str,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        self.with_users(|users| {
            let Some(user) = users.get_mut(&id) else {
                return Ok(None);
            };
            if user.reset_password_token.as_deref() != Some(expected_hash) {
                return Ok(None);
            }
            user.password_hash = password_hash.to_string();
            user.reset_password_token = None;
            user.reset_password_expire = None;
            Ok(Some(user.clone()))
        })
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.with_users(|users| Ok(users.remove(&id).is_some()))
    }

    async fn list(&self, query: ListQuery) -> Result<Page, StoreError> {
        self.with_users(|users| {
            let mut all: Vec<User> = users.values().cloned().collect();
            all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let total = all.len() as i64;
            let items = all
                .into_iter()
                .skip(query.offset.max(0) as usize)
                .take(query.limit.max(0) as usize)
                .collect();
            Ok(Page { total, items })
        })
    }
}
