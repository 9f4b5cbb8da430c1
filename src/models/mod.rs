//! Data models for Shelfmark

pub mod author;
pub mod book;
pub mod borrow;
pub mod category;
pub mod user;

// Re-export commonly used types
pub use author::{Author, AuthorDetails};
pub use book::{Book, BookDetails, BookShort, BookStatus};
pub use borrow::{BorrowRecord, BorrowRecordDetails};
pub use category::{Category, CategoryDetails};
pub use user::{User, UserShort};
