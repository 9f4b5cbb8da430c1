//! Book model, circulation status and catalog payloads

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult, FieldErrors};

static ISBN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d{9}[\dX]|\d{13})$").expect("valid ISBN pattern"));

/// Circulation status of a book
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Available,
    Borrowed,
    Reserved,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Borrowed => "borrowed",
            BookStatus::Reserved => "reserved",
        }
    }

    /// Only an available book can be handed out
    pub fn ensure_borrowable(self) -> AppResult<()> {
        match self {
            BookStatus::Available => Ok(()),
            other => Err(AppError::Conflict(format!("Book is {}, not available", other))),
        }
    }

    /// Status resulting from a direct edit of the book.
    ///
    /// `borrowed` is entered and left only by lending and returning, so a
    /// borrowed book keeps its status until it comes back.
    pub fn assign(self, requested: Option<BookStatus>) -> AppResult<BookStatus> {
        match (self, requested) {
            (current, None) => Ok(current),
            (BookStatus::Borrowed, Some(BookStatus::Borrowed)) => Ok(BookStatus::Borrowed),
            (BookStatus::Borrowed, Some(_)) => Err(AppError::Conflict(
                "Book is currently borrowed; record its return first".to_string(),
            )),
            (_, Some(BookStatus::Borrowed)) => Err(AppError::Validation(FieldErrors::single(
                "status",
                "Borrowed status is set by lending the book",
            ))),
            (_, Some(status)) => Ok(status),
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(BookStatus::Available),
            "borrowed" => Ok(BookStatus::Borrowed),
            "reserved" => Ok(BookStatus::Reserved),
            _ => Err(format!("Invalid book status: {}", s)),
        }
    }
}

// SQLx conversion for BookStatus (stored as text)
impl sqlx::Type<Postgres> for BookStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for BookStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BookStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Book row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub isbn: Option<String>,
    pub author_id: i32,
    pub category_id: Option<i32>,
    pub description: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub pages: Option<i32>,
    pub status: BookStatus,
    /// Path relative to the media root
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Book as shown in listings, with author and category names
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub title: String,
    pub isbn: Option<String>,
    pub author_id: i32,
    pub author_name: String,
    pub category_id: Option<i32>,
    pub category_name: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub status: BookStatus,
}

/// Book with full details for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookDetails {
    #[serde(flatten)]
    pub book: Book,
    pub author_name: String,
    pub category_name: Option<String>,
}

/// Create / update book request (updates replace every editable field)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookPayload {
    #[validate(length(min = 1, max = 300, message = "Title must be 1-300 characters"))]
    pub title: String,
    /// ISBN-10 or ISBN-13; spaces and hyphens are ignored
    pub isbn: Option<String>,
    pub author_id: i32,
    pub category_id: Option<i32>,
    pub description: Option<String>,
    pub published_date: Option<NaiveDate>,
    #[validate(range(min = 1, message = "Number of pages must be positive"))]
    pub pages: Option<i32>,
    /// `available` or `reserved`; omitted keeps the current status (`available` on create)
    pub status: Option<BookStatus>,
}

impl BookPayload {
    /// Trim and normalise fields, then check every constraint that does not need the store.
    ///
    /// `current` is the status of the stored book (`available` for a new one).
    pub fn clean(&mut self, current: BookStatus) -> AppResult<()> {
        self.title = self.title.trim().to_string();
        self.isbn = self.isbn.as_deref().and_then(normalize_isbn);
        self.description = non_blank(self.description.take());

        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => e.into(),
        };

        if let Some(ref isbn) = self.isbn {
            if !ISBN_RE.is_match(isbn) {
                errors.add("isbn", "ISBN must be 10 or 13 characters (digits, final X allowed for ISBN-10)");
            }
        }

        match current.assign(self.status) {
            Ok(_) => {}
            Err(AppError::Validation(status_errors)) => errors.merge(status_errors),
            Err(e) => return Err(e),
        }

        errors.into_result()
    }
}

/// Book listing filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive substring of the title
    pub q: Option<String>,
    pub status: Option<BookStatus>,
    pub author_id: Option<i32>,
    pub category_id: Option<i32>,
}

/// Remove separators and upper-case the check digit; blank input means no ISBN
pub fn normalize_isbn(s: &str) -> Option<String> {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Blank optional text is stored as NULL
pub fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
