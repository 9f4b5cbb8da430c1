//! Repository layer for database operations

pub mod authors;
pub mod books;
pub mod borrows;
pub mod categories;
pub mod deletion;
pub mod users;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub authors: authors::AuthorsRepository,
    pub categories: categories::CategoriesRepository,
    pub books: books::BooksRepository,
    pub borrows: borrows::BorrowsRepository,
    pub users: users::UsersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            authors: authors::AuthorsRepository::new(pool.clone()),
            categories: categories::CategoriesRepository::new(pool.clone()),
            books: books::BooksRepository::new(pool.clone()),
            borrows: borrows::BorrowsRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            pool,
        }
    }

    /// Round trip to the database
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Delete one row of `entity`, applying its declared deletion policies
    pub async fn delete(
        &self,
        entity: &deletion::Entity,
        id: i32,
    ) -> crate::error::AppResult<deletion::DeletionReport> {
        deletion::delete_with_policies(&self.pool, entity, id).await
    }
}

/// `ILIKE` pattern matching `s` anywhere, with LIKE wildcards in `s` taken literally
pub(crate) fn like_pattern(s: &str) -> String {
    let mut pattern = String::with_capacity(s.len() + 2);
    pattern.push('%');
    for c in s.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("tales"), "%tales%");
        assert_eq!(like_pattern(" 100% "), "%100\\%%");
        assert_eq!(like_pattern("a_b\\c"), "%a\\_b\\\\c%");
    }
}
