//! User (borrower) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;

use crate::{
    error::AppResult,
    models::user::{CreateUser, User, UserQuery, UserShort},
};

use super::{AuthenticatedUser, JsonBody};

/// List users, e.g. to pick a borrower
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "List of users", body = Vec<UserShort>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Vec<UserShort>>> {
    let users = state.services.users.list(query.q.as_deref()).await?;
    Ok(Json(users))
}

/// Get user by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    let user = state.services.users.get_by_id(id).await?;
    Ok(Json(user))
}

/// Create a new user (staff only)
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Staff access required")
    )
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Json(user), _): JsonBody<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    claims.require_staff()?;

    let created = state.services.users.create_user(user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
