//! Service and repository tests against a real PostgreSQL database.
//!
//! Point SHELFMARK_TEST_DATABASE_URL at a disposable database; migrations are
//! applied on connect and every test works on rows it creates itself.

use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::task::JoinHandle;

use shelfmark_server::{
    models::{
        author::{Author, AuthorPayload},
        book::{Book, BookPayload, BookStatus},
        borrow::{BorrowRecordDetails, BorrowRequest, ReturnRequest},
        category::CategoryPayload,
        user::CreateUser,
    },
    repository::{deletion, Repository},
    services::Services,
    AppConfig, AppError, AppResult,
};

const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

async fn setup() -> (Services, PgPool, AppConfig) {
    let mut config = AppConfig::default();
    if let Ok(url) = std::env::var("SHELFMARK_TEST_DATABASE_URL") {
        config.database.url = url;
    }
    config.media.root = std::env::temp_dir()
        .join(format!("shelfmark-test-{}", uuid::Uuid::new_v4().simple()))
        .to_string_lossy()
        .into_owned();

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    (Services::new(Repository::new(pool.clone()), &config), pool, config)
}

fn unique(prefix: &str) -> String {
    format!("{} {}", prefix, uuid::Uuid::new_v4().simple())
}

fn book_payload(title: &str, author_id: i32) -> BookPayload {
    BookPayload {
        title: title.to_string(),
        isbn: None,
        author_id,
        category_id: None,
        description: None,
        published_date: None,
        pages: None,
        status: None,
    }
}

async fn create_author(services: &Services) -> Author {
    services
        .catalog
        .create_author(AuthorPayload {
            name: unique("Author"),
            bio: None,
            birth_date: None,
        })
        .await
        .expect("author")
}

async fn create_book(services: &Services, author_id: i32) -> Book {
    services
        .catalog
        .create_book(book_payload(&unique("Book"), author_id))
        .await
        .expect("book")
}

async fn create_borrower(services: &Services) -> i32 {
    let username = format!("reader_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
    services
        .users
        .create_user(CreateUser {
            username,
            password: "long-enough-password".to_string(),
            first_name: None,
            last_name: None,
            email: None,
            is_staff: false,
        })
        .await
        .expect("borrower")
        .id
}

async fn open_records(pool: &PgPool, book_id: i32) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM borrow_records WHERE book_id = $1 AND NOT is_returned")
        .bind(book_id)
        .fetch_one(pool)
        .await
        .expect("count")
}

async fn join_all(handles: Vec<JoinHandle<AppResult<BorrowRecordDetails>>>) -> Vec<AppResult<BorrowRecordDetails>> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.expect("task panicked"));
    }
    results
}

#[tokio::test]
#[ignore] // Run with: cargo test --test integration -- --ignored
async fn test_concurrent_borrows_lend_the_book_once() {
    let (services, pool, _) = setup().await;
    let author = create_author(&services).await;
    let book = create_book(&services, author.id).await;
    let book_id = book.id;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let circulation = services.circulation.clone();
        let borrower_id = create_borrower(&services).await;
        handles.push(tokio::spawn(async move {
            circulation
                .borrow(BorrowRequest {
                    book_id,
                    borrower_id,
                    due_date: None,
                    notes: None,
                })
                .await
        }));
    }

    let results = join_all(handles).await;
    let lent = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict(_))))
        .count();

    assert_eq!(lent, 1, "{:?}", results);
    assert_eq!(refused, 15, "{:?}", results);
    assert_eq!(open_records(&pool, book.id).await, 1);

    let stored = services.catalog.get_book(book.id).await.expect("book");
    assert_eq!(stored.book.status, BookStatus::Borrowed);

    services.catalog.delete_author(author.id).await.expect("cleanup");
}

#[tokio::test]
#[ignore]
async fn test_concurrent_returns_close_the_record_once() {
    let (services, pool, _) = setup().await;
    let author = create_author(&services).await;
    let book = create_book(&services, author.id).await;
    let borrower_id = create_borrower(&services).await;

    let record = services
        .circulation
        .borrow(BorrowRequest {
            book_id: book.id,
            borrower_id,
            due_date: None,
            notes: None,
        })
        .await
        .expect("borrow");
    let record_id = record.id;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let circulation = services.circulation.clone();
        handles.push(tokio::spawn(async move {
            circulation.return_book(record_id, ReturnRequest::default()).await
        }));
    }

    let results = join_all(handles).await;
    let returned = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::AlreadyReturned(_))))
        .count();

    assert_eq!(returned, 1, "{:?}", results);
    assert_eq!(duplicates, 7, "{:?}", results);
    assert_eq!(open_records(&pool, book.id).await, 0);

    let stored = services.catalog.get_book(book.id).await.expect("book");
    assert_eq!(stored.book.status, BookStatus::Available);

    services.catalog.delete_author(author.id).await.expect("cleanup");
}

#[tokio::test]
#[ignore]
async fn test_second_open_record_refused_by_index() {
    let (services, pool, _) = setup().await;
    let author = create_author(&services).await;
    let book = create_book(&services, author.id).await;
    let borrower_id = create_borrower(&services).await;

    services
        .circulation
        .borrow(BorrowRequest {
            book_id: book.id,
            borrower_id,
            due_date: None,
            notes: None,
        })
        .await
        .expect("borrow");

    // Bypasses the book row lock: only the partial unique index stands in the way
    let err = sqlx::query(
        "INSERT INTO borrow_records (book_id, borrower_id, due_date) VALUES ($1, $2, NOW())",
    )
    .bind(book.id)
    .bind(borrower_id)
    .execute(&pool)
    .await
    .expect_err("second open record must be refused");

    match err {
        sqlx::Error::Database(db) => assert!(db.is_unique_violation()),
        other => panic!("expected unique violation, got {:?}", other),
    }

    services.catalog.delete_author(author.id).await.expect("cleanup");
}

#[tokio::test]
#[ignore]
async fn test_deletion_reports_cover_files() {
    let (services, pool, _) = setup().await;
    let repository = Repository::new(pool);
    let author = create_author(&services).await;
    let with_cover = create_book(&services, author.id).await;
    create_book(&services, author.id).await;

    repository
        .books
        .set_cover(with_cover.id, "book_covers/cover.png")
        .await
        .expect("cover");

    let report = repository
        .delete(&deletion::AUTHORS, author.id)
        .await
        .expect("delete");

    assert_eq!(report.files, vec!["book_covers/cover.png".to_string()]);
    assert_eq!(report.count("books", deletion::DeletePolicy::Cascade), 2);
}

#[tokio::test]
#[ignore]
async fn test_book_delete_removes_cover_file() {
    let (services, _, config) = setup().await;
    let author = create_author(&services).await;
    let book = create_book(&services, author.id).await;

    let with_cover = services
        .catalog
        .set_cover(book.id, PNG_HEADER)
        .await
        .expect("cover upload");
    let (bytes, content_type) = services.catalog.get_cover(book.id).await.expect("cover");
    assert_eq!(bytes, PNG_HEADER);
    assert_eq!(content_type, "image/png");
    let stored = std::path::Path::new(&config.media.root).join(with_cover.cover_image.expect("cover path"));
    assert!(stored.exists());

    services.catalog.delete_book(book.id).await.expect("delete");

    assert!(!stored.exists());

    assert!(matches!(
        services.catalog.get_cover(book.id).await,
        Err(AppError::NotFound(_))
    ));

    services.catalog.delete_author(author.id).await.expect("cleanup");
}

#[tokio::test]
#[ignore]
async fn test_missing_reference_on_write_is_a_field_error() {
    let (services, pool, _) = setup().await;
    let repository = Repository::new(pool);
    let author = create_author(&services).await;

    // Straight to the store, as if the author vanished after the payload was checked
    let err = repository
        .books
        .create(&book_payload("Orphan", i32::MAX))
        .await
        .expect_err("missing author");
    assert!(matches!(err, AppError::Validation(ref f) if f.get("author_id").is_some()));

    let mut payload = book_payload("Uncategorised", author.id);
    payload.category_id = Some(i32::MAX);
    let err = repository.books.create(&payload).await.expect_err("missing category");
    assert!(matches!(err, AppError::Validation(ref f) if f.get("category_id").is_some()));

    let book = create_book(&services, author.id).await;
    let err = repository
        .books
        .update(book.id, &payload)
        .await
        .expect_err("missing category");
    assert!(matches!(err, AppError::Validation(ref f) if f.get("category_id").is_some()));

    services.catalog.delete_author(author.id).await.expect("cleanup");
}

#[tokio::test]
#[ignore]
async fn test_book_errors_reported_together() {
    let (services, _, _) = setup().await;
    let category = services
        .catalog
        .create_category(CategoryPayload {
            name: unique("Gothic"),
            description: None,
        })
        .await
        .expect("category");

    let mut payload = book_payload(" ", 0);
    payload.category_id = Some(category.id);
    payload.status = Some(BookStatus::Borrowed);

    match services.catalog.create_book(payload).await {
        Err(AppError::Validation(fields)) => {
            for field in ["title", "author_id", "status"] {
                assert!(fields.get(field).is_some(), "missing error for {}", field);
            }
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    services.catalog.delete_category(category.id).await.expect("cleanup");
}
