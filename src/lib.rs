//! Shelfmark library record keeper
//!
//! Keeps a library's catalog (authors, categories, books) and its circulation
//! ledger (who borrowed which book, when it is due, when it came back), and
//! exposes both through a REST JSON API behind a login wall.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
