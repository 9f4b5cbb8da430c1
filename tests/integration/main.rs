//! Integration tests
//!
//! `router_tests` drive the router in-process and need no database.
//! `store_tests` run services against PostgreSQL (SHELFMARK_TEST_DATABASE_URL)
//! and `api_tests` against a live server; both are ignored by default:
//! `cargo test --test integration -- --ignored`

mod api_tests;
mod router_tests;
mod store_tests;
