//! Circulation endpoints: lending, returning and the borrow ledger

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;

use crate::{
    error::{AppError, AppResult},
    models::borrow::{BorrowQuery, BorrowRecordDetails, BorrowRequest, LedgerQuery, ReturnRequest},
};

use super::{AuthenticatedUser, JsonBody};

/// Books currently out, most recent first
#[utoipa::path(
    get,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(LedgerQuery),
    responses(
        (status = 200, description = "Open borrow records", body = Vec<BorrowRecordDetails>),
        (status = 400, description = "Unknown filter"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<LedgerQuery>,
) -> AppResult<Json<Vec<BorrowRecordDetails>>> {
    let records = state.services.circulation.borrow_list(query).await?;
    Ok(Json(records))
}

/// Returned books, most recently borrowed first
#[utoipa::path(
    get,
    path = "/returns",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(LedgerQuery),
    responses(
        (status = 200, description = "Closed borrow records", body = Vec<BorrowRecordDetails>),
        (status = 400, description = "Unknown filter"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_returns(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<LedgerQuery>,
) -> AppResult<Json<Vec<BorrowRecordDetails>>> {
    let records = state.services.circulation.return_list(query).await?;
    Ok(Json(records))
}

/// Get a borrow record
#[utoipa::path(
    get,
    path = "/borrows/{id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Borrow record", body = BorrowRecordDetails),
        (status = 404, description = "Borrow record not found")
    )
)]
pub async fn get_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowRecordDetails>> {
    let record = state.services.circulation.get(id).await?;
    Ok(Json(record))
}

/// Lend a book
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book lent", body = BorrowRecordDetails),
        (status = 404, description = "Book or borrower not found"),
        (status = 409, description = "Book is not available", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    WithRejection(Json(request), _): JsonBody<BorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowRecordDetails>)> {
    let record = state.services.circulation.borrow(request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = BorrowRecordDetails),
        (status = 400, description = "Invalid return date", body = crate::error::ErrorResponse),
        (status = 404, description = "Borrow record not found"),
        (status = 409, description = "Already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Bytes,
) -> AppResult<Json<BorrowRecordDetails>> {
    // The body is optional; an empty one returns the book now without notes
    let request: ReturnRequest = if body.is_empty() {
        ReturnRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    let record = state.services.circulation.return_book(id, request).await?;
    Ok(Json(record))
}

/// Open loans of one borrower (`is_returned=true` for their history)
#[utoipa::path(
    get,
    path = "/users/{id}/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID"),
        BorrowQuery
    ),
    responses(
        (status = 200, description = "Borrow records of the user", body = Vec<BorrowRecordDetails>),
        (status = 404, description = "User not found")
    )
)]
pub async fn user_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
    Query(query): Query<BorrowQuery>,
) -> AppResult<Json<Vec<BorrowRecordDetails>>> {
    let records = state.services.circulation.user_borrows(user_id, query).await?;
    Ok(Json(records))
}
