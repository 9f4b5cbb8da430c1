//! Authentication endpoints

use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;

use crate::{
    error::AppResult,
    models::user::{LoginRequest, LoginResponse, User},
};

use super::{AuthenticatedUser, JsonBody};

/// Log in and obtain a bearer token
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    WithRejection(Json(request), _): JsonBody<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let response = state
        .services
        .users
        .authenticate(&request.username, &request.password)
        .await?;
    Ok(Json(response))
}

/// Current user
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.users.get_by_id(claims.user_id).await?;
    Ok(Json(user))
}
