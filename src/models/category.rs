//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::book::{non_blank, BookShort};
use crate::error::{AppResult, FieldErrors};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryDetails {
    #[serde(flatten)]
    pub category: Category,
    pub books: Vec<BookShort>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CategoryPayload {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    pub description: Option<String>,
}

impl CategoryPayload {
    pub fn clean(&mut self) -> AppResult<()> {
        self.name = self.name.trim().to_string();
        self.description = non_blank(self.description.take());

        match self.validate() {
            Ok(()) => Ok(()),
            Err(e) => FieldErrors::from(e).into_result(),
        }
    }
}
