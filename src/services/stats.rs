//! Dashboard statistics

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::borrow::{BorrowQuery, BorrowRecordDetails},
    repository::Repository,
};

const RECENT_BORROWS: i64 = 5;

/// Library dashboard, computed on demand
#[derive(Debug, Serialize, ToSchema)]
pub struct Dashboard {
    pub total_books: i64,
    pub available_books: i64,
    pub borrowed_books: i64,
    pub reserved_books: i64,
    pub total_authors: i64,
    pub total_categories: i64,
    pub open_borrows: i64,
    pub recent_borrows: Vec<BorrowRecordDetails>,
    pub overdue_borrows: Vec<BorrowRecordDetails>,
    pub returned_this_month: i64,
}

/// `[first instant of the month of now, first instant of the next month)` in UTC
pub fn month_bounds(now: DateTime<Utc>) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let (next_year, next_month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };

    let start = Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0).single();
    let end = Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0).single();

    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(AppError::Internal(format!("No month boundaries for {}", now))),
    }
}

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Database reachable
    pub async fn ready(&self) -> AppResult<()> {
        self.repository.ping().await
    }

    pub async fn dashboard(&self) -> AppResult<Dashboard> {
        // One clock reading for every figure
        let now = Utc::now();
        let (month_start, month_end) = month_bounds(now)?;

        let books = self.repository.books.count_by_status().await?;
        let total_authors = self.repository.authors.count().await?;
        let total_categories = self.repository.categories.count().await?;
        let open_borrows = self.repository.borrows.count_open().await?;
        let recent_borrows = self.repository.borrows.recent(RECENT_BORROWS, now).await?;
        let overdue_borrows = self
            .repository
            .borrows
            .search(
                &BorrowQuery {
                    overdue: Some(true),
                    ..Default::default()
                },
                now,
            )
            .await?;
        let returned_this_month = self
            .repository
            .borrows
            .count_returned_between(month_start, month_end)
            .await?;

        Ok(Dashboard {
            total_books: books.total,
            available_books: books.available,
            borrowed_books: books.borrowed,
            reserved_books: books.reserved,
            total_authors,
            total_categories,
            open_borrows,
            recent_borrows,
            overdue_borrows,
            returned_this_month,
        })
    }
}
