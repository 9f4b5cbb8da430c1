//! End-to-end API tests against a running server and database.
//!
//! The server must have a staff account bootstrapped from its configuration;
//! point the tests at it with SHELFMARK_TEST_URL, SHELFMARK_TEST_USERNAME
//! and SHELFMARK_TEST_PASSWORD.

use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

fn base_url() -> String {
    std::env::var("SHELFMARK_TEST_URL").unwrap_or_else(|_| "http://localhost:8080/api/v1".to_string())
}

fn credentials() -> (String, String) {
    (
        std::env::var("SHELFMARK_TEST_USERNAME").unwrap_or_else(|_| "admin".to_string()),
        std::env::var("SHELFMARK_TEST_PASSWORD").unwrap_or_else(|_| "change-me-please".to_string()),
    )
}

/// Unique suffix so repeated runs do not collide on unique names
fn unique(prefix: &str) -> String {
    format!("{} {}", prefix, uuid::Uuid::new_v4().simple())
}

/// Helper to get an authenticated client token
async fn get_auth_token(client: &Client) -> String {
    let (username, password) = credentials();
    let response = client
        .post(format!("{}/auth/login", base_url()))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(response.status(), StatusCode::OK, "login failed");
    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

async fn post(client: &Client, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let response = client
        .post(format!("{}{}", base_url(), path))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn get(client: &Client, token: &str, path: &str) -> (StatusCode, Value) {
    let response = client
        .get(format!("{}{}", base_url(), path))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn delete(client: &Client, token: &str, path: &str) -> StatusCode {
    client
        .delete(format!("{}{}", base_url(), path))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to send request")
        .status()
}

async fn create_author(client: &Client, token: &str, name: &str) -> i64 {
    let (status, body) = post(client, token, "/authors", json!({ "name": name })).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().expect("author id")
}

async fn create_book(client: &Client, token: &str, title: &str, author_id: i64, category_id: Option<i64>) -> i64 {
    let (status, body) = post(
        client,
        token,
        "/books",
        json!({ "title": title, "author_id": author_id, "category_id": category_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["status"], "available");
    body["id"].as_i64().expect("book id")
}

async fn create_borrower(client: &Client, token: &str) -> i64 {
    let username = format!("reader_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
    let (status, body) = post(
        client,
        token,
        "/users",
        json!({ "username": username, "password": "long-enough-password" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().expect("user id")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();
    let (username, _) = credentials();

    let response = client
        .post(format!("{}/auth/login", base_url()))
        .json(&json!({ "username": username, "password": "wrong-password" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_return_lifecycle() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let author = create_author(&client, &token, &unique("A. Poe")).await;
    let book = create_book(&client, &token, &unique("Tales"), author, None).await;
    let borrower = create_borrower(&client, &token).await;
    let other = create_borrower(&client, &token).await;

    let (status, record) = post(
        &client,
        &token,
        "/borrows",
        json!({ "book_id": book, "borrower_id": borrower, "notes": "First loan" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", record);
    assert_eq!(record["book"]["status"], "borrowed");
    assert_eq!(record["is_returned"], false);
    assert_eq!(record["is_overdue"], false);
    let record_id = record["id"].as_i64().expect("record id");

    // The book is out: a second borrower is refused and nothing is written
    let (status, body) = post(
        &client,
        &token,
        "/borrows",
        json!({ "book_id": book, "borrower_id": other }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "BookNotAvailable");

    let (_, open) = get(&client, &token, &format!("/users/{}/borrows", other)).await;
    assert_eq!(open.as_array().map(Vec::len), Some(0));

    let (status, returned) = post(
        &client,
        &token,
        &format!("/borrows/{}/return", record_id),
        json!({ "notes": "Returned in good shape" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", returned);
    assert_eq!(returned["is_returned"], true);
    assert!(returned["return_date"].is_string());
    assert_eq!(returned["book"]["status"], "available");
    assert_eq!(returned["notes"], "First loan\nReturned in good shape");

    // A closed record is never closed twice
    let (status, body) = post(&client, &token, &format!("/borrows/{}/return", record_id), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyReturned");

    let (_, closed) = get(&client, &token, &format!("/users/{}/borrows?is_returned=true", borrower)).await;
    assert!(closed
        .as_array()
        .expect("records")
        .iter()
        .any(|r| r["id"].as_i64() == Some(record_id)));

    assert_eq!(delete(&client, &token, &format!("/authors/{}", author)).await, StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore]
async fn test_past_due_date_is_immediately_overdue() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let author = create_author(&client, &token, &unique("Overdue Author")).await;
    let book = create_book(&client, &token, &unique("Late Book"), author, None).await;
    let borrower = create_borrower(&client, &token).await;

    let yesterday = Utc::now() - Duration::days(1);
    let (status, record) = post(
        &client,
        &token,
        "/borrows",
        json!({ "book_id": book, "borrower_id": borrower, "due_date": yesterday }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", record);
    assert_eq!(record["is_overdue"], true);
    let record_id = record["id"].as_i64().expect("record id");

    let (_, overdue) = get(&client, &token, "/borrows?overdue=true").await;
    assert!(overdue
        .as_array()
        .expect("records")
        .iter()
        .any(|r| r["id"].as_i64() == Some(record_id)));

    let (_, dashboard) = get(&client, &token, "/dashboard").await;
    assert!(dashboard["overdue_borrows"]
        .as_array()
        .expect("overdue list")
        .iter()
        .any(|r| r["id"].as_i64() == Some(record_id)));

    // Returning late clears the overdue flag
    let (status, returned) = post(&client, &token, &format!("/borrows/{}/return", record_id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["is_overdue"], false);

    assert_eq!(delete(&client, &token, &format!("/authors/{}", author)).await, StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore]
async fn test_category_delete_keeps_books() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let (status, category) = post(&client, &token, "/categories", json!({ "name": unique("Gothic") })).await;
    assert_eq!(status, StatusCode::CREATED, "{}", category);
    let category_id = category["id"].as_i64().expect("category id");

    // Category names are unique
    let (status, body) = post(&client, &token, "/categories", json!({ "name": category["name"] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["name"].is_array());

    let author = create_author(&client, &token, &unique("Category Author")).await;
    let book = create_book(&client, &token, &unique("Uncategorised"), author, Some(category_id)).await;

    assert_eq!(
        delete(&client, &token, &format!("/categories/{}", category_id)).await,
        StatusCode::NO_CONTENT
    );

    let (status, details) = get(&client, &token, &format!("/books/{}", book)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(details["category_id"].is_null());

    assert_eq!(delete(&client, &token, &format!("/authors/{}", author)).await, StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore]
async fn test_author_delete_cascades_to_books_and_records() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let author = create_author(&client, &token, &unique("Cascade Author")).await;
    let book = create_book(&client, &token, &unique("Doomed"), author, None).await;
    let borrower = create_borrower(&client, &token).await;

    let (status, record) = post(
        &client,
        &token,
        "/borrows",
        json!({ "book_id": book, "borrower_id": borrower }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let record_id = record["id"].as_i64().expect("record id");

    assert_eq!(delete(&client, &token, &format!("/authors/{}", author)).await, StatusCode::NO_CONTENT);

    let (status, _) = get(&client, &token, &format!("/books/{}", book)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&client, &token, &format!("/borrows/{}", record_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(delete(&client, &token, &format!("/authors/{}", author)).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_book_validation_errors() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let (status, body) = post(
        &client,
        &token,
        "/books",
        json!({ "title": " ", "isbn": "12-34", "author_id": 0, "pages": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    for field in ["title", "isbn", "author_id", "pages"] {
        assert!(body["fields"][field].is_array(), "missing error for {}", field);
    }

    let author = create_author(&client, &token, &unique("Validation Author")).await;
    let (status, body) = post(
        &client,
        &token,
        "/books",
        json!({ "title": "Direct", "author_id": author, "status": "borrowed" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["status"].is_array());

    assert_eq!(delete(&client, &token, &format!("/authors/{}", author)).await, StatusCode::NO_CONTENT);
}
