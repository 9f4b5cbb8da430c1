//! Users repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::like_pattern;
use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, User, UserShort},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list(&self, username_filter: Option<&str>) -> AppResult<Vec<UserShort>> {
        let users = sqlx::query_as::<_, UserShort>(
            r#"
            SELECT id, username, first_name, last_name FROM users
            WHERE ($1::text IS NULL OR username ILIKE $1)
            ORDER BY username
            "#,
        )
        .bind(username_filter.map(like_pattern))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Insert a user; `password_hash` is the already hashed password
    pub async fn create(&self, user: &CreateUser, password_hash: &str) -> AppResult<User> {
        let now = Utc::now();

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password, first_name, last_name, email, is_staff, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.is_staff)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::unique_violation(e, "username", "This username is already taken"))
    }
}
