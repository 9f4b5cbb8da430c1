//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{CreateUser, LoginResponse, User, UserClaims, UserShort},
    repository::Repository,
};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored Argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate by username and password and issue a session token
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<LoginResponse> {
        let user = self
            .repository
            .users
            .get_by_username(username.trim())
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !verify_password(&user.password, password)? {
            tracing::warn!("Failed login for {}", user.username);
            return Err(AppError::Authentication("Invalid username or password".to_string()));
        }

        let now = Utc::now().timestamp();
        let expires_in = self.config.jwt_expiration_hours as i64 * 3600;

        let claims = UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            is_staff: user.is_staff,
            exp: now + expires_in,
            iat: now,
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        tracing::info!("User {} logged in", user.username);

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in,
        })
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Borrower selection list
    pub async fn list(&self, username: Option<&str>) -> AppResult<Vec<UserShort>> {
        self.repository.users.list(username).await
    }

    pub async fn create_user(&self, mut user: CreateUser) -> AppResult<User> {
        user.clean()?;
        let hash = hash_password(&user.password)?;
        let created = self.repository.users.create(&user, &hash).await?;
        tracing::info!("Created user {} (staff: {})", created.username, created.is_staff);
        Ok(created)
    }

    /// Create the configured staff account if it does not exist yet
    pub async fn ensure_admin(&self) -> AppResult<()> {
        let (Some(username), Some(password)) = (&self.config.admin_username, &self.config.admin_password)
        else {
            return Ok(());
        };

        if self.repository.users.get_by_username(username).await?.is_some() {
            return Ok(());
        }

        self.create_user(CreateUser {
            username: username.clone(),
            password: password.clone(),
            first_name: None,
            last_name: None,
            email: None,
            is_staff: true,
        })
        .await?;

        tracing::info!("Bootstrapped staff account {}", username);
        Ok(())
    }
}
