//! Book (catalog) endpoints

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::{Multipart, WithRejection};

use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::book::{Book, BookDetails, BookPayload, BookQuery, BookShort},
};

use super::{AuthenticatedUser, JsonBody};

/// Multipart field carrying the cover image
const COVER_FIELD: &str = "cover_image";

/// List books ordered by title
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "List of books", body = Vec<BookShort>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<Vec<BookShort>>> {
    let books = state.services.catalog.search_books(&query).await?;
    Ok(Json(books))
}

/// Books that can be lent right now
#[utoipa::path(
    get,
    path = "/books/available",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Available books", body = Vec<BookShort>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn available_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BookShort>>> {
    let books = state.services.catalog.available_books().await?;
    Ok(Json(books))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BookDetails>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Create a book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookPayload,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    WithRejection(Json(book), _): JsonBody<BookPayload>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let created = state.services.catalog.create_book(book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = BookPayload,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Status change refused while the book is borrowed")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    WithRejection(Json(book), _): JsonBody<BookPayload>,
) -> AppResult<Json<Book>> {
    let updated = state.services.catalog.update_book(id, book).await?;
    Ok(Json(updated))
}

/// Delete a book and its borrow records
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload or replace the cover image (multipart field `cover_image`)
#[utoipa::path(
    put,
    path = "/books/{id}/cover",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "Image in a `cover_image` field"),
    responses(
        (status = 200, description = "Cover stored", body = Book),
        (status = 400, description = "Missing or invalid image", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn upload_cover(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> AppResult<Json<Book>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(COVER_FIELD) {
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let book = state.services.catalog.set_cover(id, &bytes).await?;
        return Ok(Json(book));
    }

    Err(AppError::Validation(FieldErrors::single(
        COVER_FIELD,
        "No image was uploaded",
    )))
}

/// Serve the cover image
#[utoipa::path(
    get,
    path = "/books/{id}/cover",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Cover image", content_type = "image/*"),
        (status = 404, description = "Book or cover not found")
    )
)]
pub async fn get_cover(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let (bytes, content_type) = state.services.catalog.get_cover(id).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
