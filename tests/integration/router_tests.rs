//! Router-level tests over a lazily connected pool: every request here is
//! answered before any query reaches the database.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use shelfmark_server::{
    api, models::user::UserClaims, repository::Repository, services::Services, AppConfig, AppState,
};

fn app() -> (Router, AppConfig) {
    let config = AppConfig::default();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .expect("valid database url");

    let services = Services::new(Repository::new(pool), &config);
    let state = AppState {
        config: Arc::new(config.clone()),
        services: Arc::new(services),
    };

    (api::router(state), config)
}

fn token(config: &AppConfig, is_staff: bool) -> String {
    let now = Utc::now().timestamp();
    UserClaims {
        sub: "librarian".to_string(),
        user_id: 1,
        is_staff,
        exp: now + 3600,
        iat: now,
    }
    .create_token(&config.auth.jwt_secret)
    .expect("token")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    for path in [
        "/api/v1/books",
        "/api/v1/authors",
        "/api/v1/categories",
        "/api/v1/borrows",
        "/api/v1/returns",
        "/api/v1/dashboard",
        "/api/v1/books/1/cover",
        "/api/v1/auth/me",
    ] {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", path);
        let body = body_json(response).await;
        assert_eq!(body["error"], "NotAuthorized");
    }
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let (app, _) = app();

    let response = app
        .oneshot(
            Request::get("/api/v1/books")
                .header(header::AUTHORIZATION, "Bearer not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_rejected() {
    let (app, config) = app();
    let mut other = config.clone();
    other.auth.jwt_secret = "another-secret".to_string();

    let response = app
        .oneshot(
            Request::get("/api/v1/dashboard")
                .header(header::AUTHORIZATION, format!("Bearer {}", token(&other, true)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_staff_cannot_create_users() {
    let (app, config) = app();

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/users")
                .header(header::AUTHORIZATION, format!("Bearer {}", token(&config, false)))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"username":"reader","password":"long-enough"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_json_uses_error_shape() {
    let (app, config) = app();

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/authors")
                .header(header::AUTHORIZATION, format!("Bearer {}", token(&config, true)))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"name\": "))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_malformed_return_body_rejected() {
    let (app, config) = app();

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/borrows/1/return")
                .header(header::AUTHORIZATION, format!("Bearer {}", token(&config, true)))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"return_date\": \"yesterday\"}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ledger_lists_reject_returned_filter() {
    for path in ["/api/v1/borrows?is_returned=true", "/api/v1/returns?is_returned=false"] {
        let (app, config) = app();
        let response = app
            .oneshot(
                Request::get(path)
                    .header(header::AUTHORIZATION, format!("Bearer {}", token(&config, true)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", path);
    }
}

#[tokio::test]
async fn test_openapi_document_served() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["paths"]["/borrows/{id}/return"].is_object());
}
