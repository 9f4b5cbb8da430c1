//! API handlers for Shelfmark REST endpoints

pub mod auth;
pub mod authors;
pub mod books;
pub mod borrows;
pub mod categories;
pub mod dashboard;
pub mod health;
pub mod openapi;
pub mod users;

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// JSON request body whose rejections are reported in the usual error shape
pub type JsonBody<T> = WithRejection<Json<T>, AppError>;

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = state.config.media.max_upload_bytes;

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/borrows", get(borrows::user_borrows))
        // Authors
        .route("/authors", get(authors::list_authors).post(authors::create_author))
        .route(
            "/authors/:id",
            get(authors::get_author)
                .put(authors::update_author)
                .delete(authors::delete_author),
        )
        // Categories
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/available", get(books::available_books))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route(
            "/books/:id/cover",
            put(books::upload_cover)
                .get(books::get_cover)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Circulation
        .route("/borrows", get(borrows::list_borrows).post(borrows::borrow_book))
        .route("/borrows/:id", get(borrows::get_borrow))
        .route("/borrows/:id/return", post(borrows::return_book))
        .route("/returns", get(borrows::list_returns))
        // Reporting
        .route("/dashboard", get(dashboard::get_dashboard))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
