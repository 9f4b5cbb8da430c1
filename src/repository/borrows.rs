//! Borrow records repository.
//!
//! Lending and returning each touch a book row and a borrow record row; both
//! writes happen in one transaction holding a row lock, so concurrent lenders
//! of the same book are serialised and the loser sees the book as borrowed.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::like_pattern;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookStatus,
        borrow::{
            BorrowQuery, BorrowRecord, BorrowRecordDetails, BorrowRecordRow, Closing,
            NewBorrowRecord,
        },
    },
};

const DETAILS_SELECT: &str = r#"
    SELECT r.id, r.book_id, b.title AS book_title, b.status AS book_status,
           r.borrower_id, u.username AS borrower_username,
           u.first_name AS borrower_first_name, u.last_name AS borrower_last_name,
           r.borrow_date, r.due_date, r.return_date, r.is_returned, r.notes
    FROM borrow_records r
    JOIN books b ON b.id = r.book_id
    JOIN users u ON u.id = r.borrower_id
"#;

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Record with book and borrower, `is_overdue` evaluated at `now`
    pub async fn get_details(&self, id: i32, now: DateTime<Utc>) -> AppResult<BorrowRecordDetails> {
        let sql = format!("{} WHERE r.id = $1", DETAILS_SELECT);
        sqlx::query_as::<_, BorrowRecordRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.into_details(now))
            .ok_or_else(|| AppError::NotFound(format!("Borrow record with id {} not found", id)))
    }

    /// Ledger listing, most recent borrow first
    pub async fn search(
        &self,
        query: &BorrowQuery,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<BorrowRecordDetails>> {
        let sql = format!(
            r#"{}
            WHERE ($1::bool IS NULL OR r.is_returned = $1)
              AND ($2::bool IS NULL OR (NOT r.is_returned AND r.due_date < $3) = $2)
              AND ($4::int IS NULL OR r.borrower_id = $4)
              AND ($5::text IS NULL OR b.title ILIKE $5 OR u.username ILIKE $5)
            ORDER BY r.borrow_date DESC, r.id DESC
            "#,
            DETAILS_SELECT
        );

        let rows = sqlx::query_as::<_, BorrowRecordRow>(&sql)
            .bind(query.is_returned)
            .bind(query.overdue)
            .bind(now)
            .bind(query.borrower_id)
            .bind(query.q.as_deref().map(like_pattern))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.into_details(now)).collect())
    }

    /// Most recently borrowed records
    pub async fn recent(&self, limit: i64, now: DateTime<Utc>) -> AppResult<Vec<BorrowRecordDetails>> {
        let sql = format!("{} ORDER BY r.borrow_date DESC, r.id DESC LIMIT $1", DETAILS_SELECT);
        let rows = sqlx::query_as::<_, BorrowRecordRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.into_details(now)).collect())
    }

    /// Records closed with a return date in `[start, end)`
    pub async fn count_returned_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records WHERE is_returned AND return_date >= $1 AND return_date < $2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn count_open(&self) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM borrow_records WHERE NOT is_returned")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Lend a book: insert an open record and mark the book borrowed
    pub async fn open(&self, record: &NewBorrowRecord) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        let status: BookStatus =
            sqlx::query_scalar("SELECT status FROM books WHERE id = $1 FOR UPDATE")
                .bind(record.book_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Book with id {} not found", record.book_id))
                })?;

        status.ensure_borrowable()?;

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO borrow_records (
                book_id, borrower_id, borrow_date, due_date, is_returned, notes,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, FALSE, $5, $3, $3)
            RETURNING id
            "#,
        )
        .bind(record.book_id)
        .bind(record.borrower_id)
        .bind(record.borrow_date)
        .bind(record.due_date)
        .bind(&record.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| open_conflict(e, record))?;

        sqlx::query("UPDATE books SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(record.book_id)
            .bind(BookStatus::Borrowed)
            .bind(record.borrow_date)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Return a book: close the record and mark the book available again
    pub async fn close(
        &self,
        id: i32,
        now: DateTime<Utc>,
        return_date: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> AppResult<BorrowRecord> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, BorrowRecord>(
            "SELECT * FROM borrow_records WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow record with id {} not found", id)))?;

        let Closing { return_date, notes } = record.close(now, return_date, notes)?;

        let closed = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrow_records
            SET return_date = $2, is_returned = TRUE, notes = $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(return_date)
        .bind(&notes)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE books SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(closed.book_id)
            .bind(BookStatus::Available)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(closed)
    }
}

/// The partial unique index allows one open record per book; a missing borrower trips the foreign key
fn open_conflict(err: sqlx::Error, record: &NewBorrowRecord) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
            "Book {} already has an open borrow record",
            record.book_id
        )),
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::NotFound(format!(
            "User with id {} not found",
            record.borrower_id
        )),
        _ => AppError::Database(err),
    }
}
