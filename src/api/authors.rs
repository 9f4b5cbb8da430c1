//! Author endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;

use crate::{
    error::AppResult,
    models::author::{Author, AuthorDetails, AuthorPayload, NameQuery},
};

use super::{AuthenticatedUser, JsonBody};

/// List authors ordered by name
#[utoipa::path(
    get,
    path = "/authors",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(NameQuery),
    responses(
        (status = 200, description = "List of authors", body = Vec<Author>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_authors(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<NameQuery>,
) -> AppResult<Json<Vec<Author>>> {
    let authors = state.services.catalog.list_authors(query.q.as_deref()).await?;
    Ok(Json(authors))
}

/// Get author details with their books
#[utoipa::path(
    get,
    path = "/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Author ID")
    ),
    responses(
        (status = 200, description = "Author details", body = AuthorDetails),
        (status = 404, description = "Author not found")
    )
)]
pub async fn get_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<AuthorDetails>> {
    let author = state.services.catalog.get_author(id).await?;
    Ok(Json(author))
}

/// Create an author
#[utoipa::path(
    post,
    path = "/authors",
    tag = "authors",
    security(("bearer_auth" = [])),
    request_body = AuthorPayload,
    responses(
        (status = 201, description = "Author created", body = Author),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    WithRejection(Json(author), _): JsonBody<AuthorPayload>,
) -> AppResult<(StatusCode, Json<Author>)> {
    let created = state.services.catalog.create_author(author).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update an author
#[utoipa::path(
    put,
    path = "/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Author ID")
    ),
    request_body = AuthorPayload,
    responses(
        (status = 200, description = "Author updated", body = Author),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Author not found")
    )
)]
pub async fn update_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    WithRejection(Json(author), _): JsonBody<AuthorPayload>,
) -> AppResult<Json<Author>> {
    let updated = state.services.catalog.update_author(id, author).await?;
    Ok(Json(updated))
}

/// Delete an author, their books and those books' borrow records
#[utoipa::path(
    delete,
    path = "/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Author ID")
    ),
    responses(
        (status = 204, description = "Author deleted"),
        (status = 404, description = "Author not found")
    )
)]
pub async fn delete_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_author(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
