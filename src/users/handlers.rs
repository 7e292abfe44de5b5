use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::Caller,
    error::AppError,
    state::AppState,
    users::{
        dto::{DataResponse, ListResponse, Pagination, PublicUser},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user).delete(delete_user))
        .route("/users/active/:id", put(activate_user))
        .route("/users/block/:id", put(block_user))
}

/// Ids that do not parse cannot name a user.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse().map_err(|_| AppError::NotFound)
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    caller: Caller,
    Query(p): Query<Pagination>,
) -> Result<Json<ListResponse>, AppError> {
    let page = services::list_users(&state, caller.is_admin, p).await?;
    let data: Vec<PublicUser> = page.items.into_iter().map(PublicUser::from).collect();
    Ok(Json(ListResponse {
        success: true,
        count: data.len(),
        total: page.total,
        data,
    }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<PublicUser>>, AppError> {
    let user = services::get_user(&state, caller.is_admin, parse_id(&id)?).await?;
    Ok(Json(DataResponse::ok(user.into())))
}

#[instrument(skip(state))]
pub async fn activate_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<PublicUser>>, AppError> {
    let user = services::set_active(&state, caller.is_admin, parse_id(&id)?, true).await?;
    Ok(Json(DataResponse::ok(user.into())))
}

#[instrument(skip(state))]
pub async fn block_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<PublicUser>>, AppError> {
    let user = services::set_active(&state, caller.is_admin, parse_id(&id)?, false).await?;
    Ok(Json(DataResponse::ok(user.into())))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    services::delete_user(&state, caller.is_admin, parse_id(&id)?).await?;
    Ok(Json(json!({ "success": true, "data": {} })))
}
