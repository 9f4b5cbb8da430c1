//! Author model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::book::{non_blank, BookShort};
use crate::error::{AppResult, FieldErrors};

/// Author row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Author {
    pub id: i32,
    pub name: String,
    pub bio: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author with the books they wrote
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthorDetails {
    #[serde(flatten)]
    pub author: Author,
    pub books: Vec<BookShort>,
}

/// Create / update author request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AuthorPayload {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    pub bio: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl AuthorPayload {
    pub fn clean(&mut self) -> AppResult<()> {
        self.name = self.name.trim().to_string();
        self.bio = non_blank(self.bio.take());

        match self.validate() {
            Ok(()) => Ok(()),
            Err(e) => FieldErrors::from(e).into_result(),
        }
    }
}

/// Name filter shared by author and category listings
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct NameQuery {
    /// Case-insensitive substring of the name
    pub q: Option<String>,
}
