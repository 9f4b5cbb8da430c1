//! Categories repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::like_pattern;
use crate::{
    error::{AppError, AppResult},
    models::category::{Category, CategoryPayload},
};

const DUPLICATE_NAME: &str = "A category with this name already exists";

#[derive(Clone)]
pub struct CategoriesRepository {
    pool: Pool<Postgres>,
}

impl CategoriesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
    }

    pub async fn exists(&self, id: i32) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Check whether another category already uses this name
    pub async fn name_exists(&self, name: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE name = $1 AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn list(&self, name_filter: Option<&str>) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT * FROM categories
            WHERE ($1::text IS NULL OR name ILIKE $1)
            ORDER BY name
            "#,
        )
        .bind(name_filter.map(like_pattern))
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn create(&self, category: &CategoryPayload) -> AppResult<Category> {
        let now = Utc::now();

        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, description, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING *
            "#,
        )
        .bind(&category.name)
        .bind(&category.description)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::unique_violation(e, "name", DUPLICATE_NAME))
    }

    pub async fn update(&self, id: i32, category: &CategoryPayload) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories SET name = $2, description = $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::unique_violation(e, "name", DUPLICATE_NAME))?
        .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
