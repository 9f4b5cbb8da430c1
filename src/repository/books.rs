//! Books repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::like_pattern;
use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::book::{Book, BookDetails, BookPayload, BookQuery, BookShort, BookStatus},
};

const DUPLICATE_ISBN: &str = "A book with this ISBN already exists";

const SHORT_SELECT: &str = r#"
    SELECT b.id, b.title, b.isbn, b.author_id, a.name AS author_name,
           b.category_id, c.name AS category_name, b.published_date, b.status
    FROM books b
    JOIN authors a ON a.id = b.author_id
    LEFT JOIN categories c ON c.id = b.category_id
"#;

/// Book counts per status
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusCounts {
    pub total: i64,
    pub available: i64,
    pub borrowed: i64,
    pub reserved: i64,
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // READ
    // =========================================================================

    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Book with author and category names
    pub async fn get_details(&self, id: i32) -> AppResult<BookDetails> {
        let book = self.get_by_id(id).await?;

        let (author_name, category_name): (String, Option<String>) = sqlx::query_as(
            r#"
            SELECT a.name, c.name
            FROM books b
            JOIN authors a ON a.id = b.author_id
            LEFT JOIN categories c ON c.id = b.category_id
            WHERE b.id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(BookDetails {
            book,
            author_name,
            category_name,
        })
    }

    /// Books matching every given filter, ordered by title
    pub async fn search(&self, query: &BookQuery) -> AppResult<Vec<BookShort>> {
        let sql = format!(
            r#"{}
            WHERE ($1::text IS NULL OR b.title ILIKE $1)
              AND ($2::text IS NULL OR b.status = $2)
              AND ($3::int IS NULL OR b.author_id = $3)
              AND ($4::int IS NULL OR b.category_id = $4)
            ORDER BY b.title, b.id
            "#,
            SHORT_SELECT
        );

        let books = sqlx::query_as::<_, BookShort>(&sql)
            .bind(query.q.as_deref().map(like_pattern))
            .bind(query.status)
            .bind(query.author_id)
            .bind(query.category_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(books)
    }

    /// Check whether another book already carries this ISBN
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn count_by_status(&self) -> AppResult<StatusCounts> {
        let rows: Vec<(BookStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM books GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            counts.total += count;
            match status {
                BookStatus::Available => counts.available = count,
                BookStatus::Borrowed => counts.borrowed = count,
                BookStatus::Reserved => counts.reserved = count,
            }
        }
        Ok(counts)
    }

    // =========================================================================
    // CREATE / UPDATE
    // =========================================================================

    pub async fn create(&self, book: &BookPayload) -> AppResult<Book> {
        let status = BookStatus::default().assign(book.status)?;
        let now = Utc::now();

        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                title, isbn, author_id, category_id, description,
                published_date, pages, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(book.author_id)
        .bind(book.category_id)
        .bind(&book.description)
        .bind(book.published_date)
        .bind(book.pages)
        .bind(status)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)
    }

    /// Replace the editable fields; the status change is checked against the locked row
    pub async fn update(&self, id: i32, book: &BookPayload) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let current: BookStatus =
            sqlx::query_scalar("SELECT status FROM books WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        let status = current.assign(book.status)?;

        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = $2, isbn = $3, author_id = $4, category_id = $5,
                description = $6, published_date = $7, pages = $8,
                status = $9, updated_at = $10
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(book.author_id)
        .bind(book.category_id)
        .bind(&book.description)
        .bind(book.published_date)
        .bind(book.pages)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(write_error)?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Record a new cover path, returning the one it replaces
    pub async fn set_cover(&self, id: i32, path: &str) -> AppResult<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<String> =
            sqlx::query_scalar("SELECT cover_image FROM books WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        sqlx::query("UPDATE books SET cover_image = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(path)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(previous)
    }
}

/// Constraint failures of a book insert or update, reported against the offending field
fn write_error(err: sqlx::Error) -> AppError {
    match &err {
        // The author or category was deleted after the payload was checked
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            let field = match db.constraint() {
                Some("books_category_id_fkey") => "category_id",
                _ => "author_id",
            };
            AppError::Validation(FieldErrors::single(
                field,
                "Referenced record does not exist",
            ))
        }
        _ => AppError::unique_violation(err, "isbn", DUPLICATE_ISBN),
    }
}
