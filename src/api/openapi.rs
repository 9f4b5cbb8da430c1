//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, authors, books, borrows, categories, dashboard, health, users};

/// Declares the `bearer_auth` scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shelfmark API",
        version = "0.3.0",
        description = "Library record keeping REST API: catalog, circulation and reporting",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::me,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Books
        books::list_books,
        books::available_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::upload_cover,
        books::get_cover,
        // Circulation
        borrows::list_borrows,
        borrows::list_returns,
        borrows::get_borrow,
        borrows::borrow_book,
        borrows::return_book,
        borrows::user_borrows,
        // Dashboard
        dashboard::get_dashboard,
    ),
    components(
        schemas(
            // Auth / users
            crate::models::user::LoginRequest,
            crate::models::user::LoginResponse,
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::CreateUser,
            // Catalog
            crate::models::author::Author,
            crate::models::author::AuthorDetails,
            crate::models::author::AuthorPayload,
            crate::models::category::Category,
            crate::models::category::CategoryDetails,
            crate::models::category::CategoryPayload,
            crate::models::book::BookStatus,
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::BookDetails,
            crate::models::book::BookPayload,
            // Circulation
            crate::models::borrow::BookRef,
            crate::models::borrow::BorrowRecordDetails,
            crate::models::borrow::BorrowRequest,
            crate::models::borrow::ReturnRequest,
            // Reporting
            crate::services::stats::Dashboard,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "Users and borrowers"),
        (name = "authors", description = "Author management"),
        (name = "categories", description = "Category management"),
        (name = "books", description = "Book catalog"),
        (name = "borrows", description = "Lending and returning"),
        (name = "dashboard", description = "Reporting")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
