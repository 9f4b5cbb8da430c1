//! Authors repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::like_pattern;
use crate::{
    error::{AppError, AppResult},
    models::author::{Author, AuthorPayload},
};

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get author by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Author> {
        sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    pub async fn exists(&self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM authors WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// List authors ordered by name, optionally filtered by a name substring
    pub async fn list(&self, name_filter: Option<&str>) -> AppResult<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>(
            r#"
            SELECT * FROM authors
            WHERE ($1::text IS NULL OR name ILIKE $1)
            ORDER BY name, id
            "#,
        )
        .bind(name_filter.map(like_pattern))
        .fetch_all(&self.pool)
        .await?;

        Ok(authors)
    }

    pub async fn create(&self, author: &AuthorPayload) -> AppResult<Author> {
        let now = Utc::now();

        let created = sqlx::query_as::<_, Author>(
            r#"
            INSERT INTO authors (name, bio, birth_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(&author.name)
        .bind(&author.bio)
        .bind(author.birth_date)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    pub async fn update(&self, id: i32, author: &AuthorPayload) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(
            r#"
            UPDATE authors SET name = $2, bio = $3, birth_date = $4, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&author.name)
        .bind(&author.bio)
        .bind(author.birth_date)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
