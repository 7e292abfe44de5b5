//! Admin moderation of user accounts. Every operation takes the caller's
//! `privileged` flag as decided at the HTTP boundary.
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    images::services as images,
    state::AppState,
    users::{
        dto::Pagination,
        repo::{ListQuery, Page},
        repo_types::{User, UserChanges, DEFAULT_PROFILE_IMAGE},
    },
};

pub const MAX_PAGE_SIZE: i64 = 100;

fn require(privileged: bool) -> Result<(), AppError> {
    if privileged {
        Ok(())
    } else {
        warn!("admin operation by unprivileged caller");
        Err(AppError::Forbidden)
    }
}

pub async fn list_users(st: &AppState, privileged: bool, p: Pagination) -> Result<Page, AppError> {
    require(privileged)?;
    let query = ListQuery {
        limit: p.limit.clamp(1, MAX_PAGE_SIZE),
        offset: p.offset.max(0),
    };
    Ok(st.store.list(query).await?)
}

pub async fn get_user(st: &AppState, privileged: bool, id: Uuid) -> Result<User, AppError> {
    require(privileged)?;
    st.store.find_by_id(id).await?.ok_or(AppError::NotFound)
}

/// Activates or blocks `id`. Asking for the state the account is already in
/// is reported as [`AppError::AlreadyInState`].
pub async fn set_active(
    st: &AppState,
    privileged: bool,
    id: Uuid,
    active: bool,
) -> Result<User, AppError> {
    require(privileged)?;
    let user = st.store.find_by_id(id).await?.ok_or(AppError::NotFound)?;
    if user.is_active == active {
        return Err(AppError::AlreadyInState(if active {
            "User already active"
        } else {
            "User already blocked"
        }));
    }

    let user = st
        .store
        .update(
            id,
            UserChanges {
                is_active: Some(active),
                ..Default::default()
            },
        )
        .await?
        .ok_or(AppError::NotFound)?;
    info!(user_id = %id, active, "user activation changed");
    Ok(user)
}

pub async fn delete_user(st: &AppState, privileged: bool, id: Uuid) -> Result<(), AppError> {
    require(privileged)?;
    let user = st.store.find_by_id(id).await?.ok_or(AppError::NotFound)?;
    if !st.store.delete(id).await? {
        return Err(AppError::NotFound);
    }
    if user.profile_image != DEFAULT_PROFILE_IMAGE {
        images::discard(st, &user.profile_image).await;
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::NewUser;

    async fn seed(st: &AppState, name: &str) -> User {
        st.store
            .insert(NewUser {
                user_name: name.into(),
                email: format!("{name}@b.com"),
                phone_number: None,
                profile_image: None,
                password_hash: "x".into(),
            })
            .await
            .unwrap()
    }

    fn page(limit: i64, offset: i64) -> Pagination {
        Pagination { limit, offset }
    }

    #[tokio::test]
    async fn unprivileged_callers_are_forbidden() {
        let st = AppState::fake();
        let user = seed(&st, "alice").await;

        assert!(matches!(
            list_users(&st, false, page(10, 0)).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(get_user(&st, false, user.id).await, Err(AppError::Forbidden)));
        assert!(matches!(
            set_active(&st, false, user.id, false).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(delete_user(&st, false, user.id).await, Err(AppError::Forbidden)));
        assert!(st.store.find_by_id(user.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn block_then_activate() {
        let st = AppState::fake();
        let user = seed(&st, "alice").await;

        let blocked = set_active(&st, true, user.id, false).await.unwrap();
        assert!(!blocked.is_active);
        let err = set_active(&st, true, user.id, false).await.unwrap_err();
        assert_eq!(err.to_string(), "User already blocked");

        let active = set_active(&st, true, user.id, true).await.unwrap();
        assert!(active.is_active);
        let err = set_active(&st, true, user.id, true).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyInState("User already active")));
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let st = AppState::fake();
        let id = Uuid::new_v4();
        assert!(matches!(get_user(&st, true, id).await, Err(AppError::NotFound)));
        assert!(matches!(set_active(&st, true, id, true).await, Err(AppError::NotFound)));
        assert!(matches!(delete_user(&st, true, id).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn delete_removes_record_and_custom_image() {
        let (st, storage) = AppState::fake_with_storage();
        let user = seed(&st, "alice").await;
        let upload = images::ImageUpload {
            file_name: "me.png".into(),
            content_type: "image/png".into(),
            body: bytes::Bytes::from_static(b"png"),
        };
        let name = images::stage_profile_image(&st, user.id, DEFAULT_PROFILE_IMAGE, upload)
            .await
            .unwrap();
        st.store
            .update(
                user.id,
                UserChanges {
                    profile_image: Some(name),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(storage.keys().len(), 1);

        delete_user(&st, true, user.id).await.unwrap();
        assert!(st.store.find_by_id(user.id).await.unwrap().is_none());
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn list_clamps_paging() {
        let st = AppState::fake();
        for i in 0..3 {
            seed(&st, &format!("user{i}")).await;
        }
        let listed = list_users(&st, true, page(0, -5)).await.unwrap();
        assert_eq!(listed.total, 3);
        assert_eq!(listed.items.len(), 1);

        let listed = list_users(&st, true, page(1000, 0)).await.unwrap();
        assert_eq!(listed.items.len(), 3);
    }
}
