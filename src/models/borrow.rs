//! Borrow record model and the rules of the loan lifecycle

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::book::{non_blank, BookStatus};
use super::user::UserShort;
use crate::error::{AppError, AppResult, FieldErrors};

/// An open record is overdue once its due date has passed
pub fn is_overdue(is_returned: bool, due_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    !is_returned && now > due_date
}

/// Caller-supplied due date, or `now + default_days`
pub fn resolve_due_date(
    now: DateTime<Utc>,
    requested: Option<DateTime<Utc>>,
    default_days: i64,
) -> DateTime<Utc> {
    requested.unwrap_or_else(|| now + Duration::days(default_days))
}

/// Return notes go on a new line after whatever was written at borrow time
pub fn append_notes(existing: Option<String>, added: Option<String>) -> Option<String> {
    match (non_blank(existing), non_blank(added)) {
        (Some(existing), Some(added)) => Some(format!("{}\n{}", existing, added)),
        (existing, added) => existing.or(added),
    }
}

/// Borrow record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BorrowRecord {
    pub id: i32,
    pub book_id: i32,
    pub borrower_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub is_returned: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field values written when a record is closed
#[derive(Debug, Clone, PartialEq)]
pub struct Closing {
    pub return_date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl BorrowRecord {
    /// Compute the closing transition; a closed record is never reopened or closed twice
    pub fn close(
        &self,
        now: DateTime<Utc>,
        return_date: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> AppResult<Closing> {
        if self.is_returned {
            return Err(AppError::AlreadyReturned(format!(
                "Borrow record {} was already returned",
                self.id
            )));
        }

        let return_date = return_date.unwrap_or(now);
        if return_date < self.borrow_date {
            return Err(AppError::Validation(FieldErrors::single(
                "return_date",
                "Return date cannot be earlier than the borrow date",
            )));
        }

        Ok(Closing {
            return_date,
            notes: append_notes(self.notes.clone(), notes),
        })
    }
}

/// Book summary embedded in borrow records
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookRef {
    pub id: i32,
    pub title: String,
    pub status: BookStatus,
}

/// Borrow record with full details for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowRecordDetails {
    pub id: i32,
    pub book: BookRef,
    pub borrower: UserShort,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub is_returned: bool,
    pub notes: Option<String>,
    /// Computed when the record is read, never stored
    pub is_overdue: bool,
}

/// Joined row backing `BorrowRecordDetails`
#[derive(Debug, FromRow)]
pub struct BorrowRecordRow {
    pub id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub book_status: BookStatus,
    pub borrower_id: i32,
    pub borrower_username: String,
    pub borrower_first_name: Option<String>,
    pub borrower_last_name: Option<String>,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub is_returned: bool,
    pub notes: Option<String>,
}

impl BorrowRecordRow {
    pub fn into_details(self, now: DateTime<Utc>) -> BorrowRecordDetails {
        BorrowRecordDetails {
            id: self.id,
            book: BookRef {
                id: self.book_id,
                title: self.book_title,
                status: self.book_status,
            },
            borrower: UserShort {
                id: self.borrower_id,
                username: self.borrower_username,
                first_name: self.borrower_first_name,
                last_name: self.borrower_last_name,
            },
            is_overdue: is_overdue(self.is_returned, self.due_date, now),
            borrow_date: self.borrow_date,
            due_date: self.due_date,
            return_date: self.return_date,
            is_returned: self.is_returned,
            notes: self.notes,
        }
    }
}

/// Values inserted when a book is lent
#[derive(Debug, Clone)]
pub struct NewBorrowRecord {
    pub book_id: i32,
    pub borrower_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Borrow request
#[derive(Debug, Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub book_id: i32,
    pub borrower_id: i32,
    /// Defaults to the configured loan period
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Return request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReturnRequest {
    /// Defaults to now
    pub return_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Ledger listing filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BorrowQuery {
    pub is_returned: Option<bool>,
    /// Only open records past their due date
    pub overdue: Option<bool>,
    pub borrower_id: Option<i32>,
    /// Case-insensitive substring of the book title or borrower username
    pub q: Option<String>,
}

/// Filters of the borrow-list and return-list, whose open/closed state is fixed by the route
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
#[serde(deny_unknown_fields)]
pub struct LedgerQuery {
    /// Only open records past their due date
    pub overdue: Option<bool>,
    pub borrower_id: Option<i32>,
    /// Case-insensitive substring of the book title or borrower username
    pub q: Option<String>,
}

impl LedgerQuery {
    pub fn with_returned(self, is_returned: bool) -> BorrowQuery {
        BorrowQuery {
            is_returned: Some(is_returned),
            overdue: self.overdue,
            borrower_id: self.borrower_id,
            q: self.q,
        }
    }
}
