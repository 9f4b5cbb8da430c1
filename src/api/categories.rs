//! Category endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;

use crate::{
    error::AppResult,
    models::{
        author::NameQuery,
        category::{Category, CategoryDetails, CategoryPayload},
    },
};

use super::{AuthenticatedUser, JsonBody};

#[utoipa::path(
    get,
    path = "/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(NameQuery),
    responses(
        (status = 200, description = "List of categories", body = Vec<Category>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_categories(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<NameQuery>,
) -> AppResult<Json<Vec<Category>>> {
    let categories = state.services.catalog.list_categories(query.q.as_deref()).await?;
    Ok(Json(categories))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category with its books", body = CategoryDetails),
        (status = 404, description = "Category not found")
    )
)]
pub async fn get_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<CategoryDetails>> {
    let category = state.services.catalog.get_category(id).await?;
    Ok(Json(category))
}

#[utoipa::path(
    post,
    path = "/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CategoryPayload,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Invalid input or duplicate name", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    WithRejection(Json(category), _): JsonBody<CategoryPayload>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let created = state.services.catalog.create_category(category).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Category ID")
    ),
    request_body = CategoryPayload,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 400, description = "Invalid input or duplicate name", body = crate::error::ErrorResponse),
        (status = 404, description = "Category not found")
    )
)]
pub async fn update_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    WithRejection(Json(category), _): JsonBody<CategoryPayload>,
) -> AppResult<Json<Category>> {
    let updated = state.services.catalog.update_category(id, category).await?;
    Ok(Json(updated))
}

/// Delete a category; its books are kept without a category
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Category ID")
    ),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found")
    )
)]
pub async fn delete_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
