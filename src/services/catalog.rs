//! Catalog management service: authors, categories and books

use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::{
        author::{Author, AuthorDetails, AuthorPayload},
        book::{Book, BookDetails, BookPayload, BookQuery, BookShort, BookStatus},
        category::{Category, CategoryDetails, CategoryPayload},
    },
    repository::{
        deletion::{self, DeletePolicy},
        Repository,
    },
    services::media::MediaService,
};

/// Field errors from a payload's own checks, so store-backed checks can be added to them
fn field_errors(result: AppResult<()>) -> AppResult<FieldErrors> {
    match result {
        Ok(()) => Ok(FieldErrors::new()),
        Err(AppError::Validation(errors)) => Ok(errors),
        Err(e) => Err(e),
    }
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    media: MediaService,
}

impl CatalogService {
    pub fn new(repository: Repository, media: MediaService) -> Self {
        Self { repository, media }
    }

    // =========================================================================
    // AUTHORS
    // =========================================================================

    pub async fn list_authors(&self, name: Option<&str>) -> AppResult<Vec<Author>> {
        self.repository.authors.list(name).await
    }

    pub async fn get_author(&self, id: i32) -> AppResult<AuthorDetails> {
        let author = self.repository.authors.get_by_id(id).await?;
        let books = self
            .repository
            .books
            .search(&BookQuery {
                author_id: Some(id),
                ..Default::default()
            })
            .await?;
        Ok(AuthorDetails { author, books })
    }

    pub async fn create_author(&self, mut author: AuthorPayload) -> AppResult<Author> {
        author.clean()?;
        let created = self.repository.authors.create(&author).await?;
        tracing::info!("Created author {} ({})", created.id, created.name);
        Ok(created)
    }

    pub async fn update_author(&self, id: i32, mut author: AuthorPayload) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await?;
        author.clean()?;
        self.repository.authors.update(id, &author).await
    }

    /// Delete an author together with their books and the books' borrow records
    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        let report = self.repository.delete(&deletion::AUTHORS, id).await?;

        tracing::info!(
            "Deleted author {}: {} book(s) and {} borrow record(s) cascaded",
            id,
            report.count("books", DeletePolicy::Cascade),
            report.count("borrow_records", DeletePolicy::Cascade)
        );

        self.media.remove_all(report.files).await;
        Ok(())
    }

    // =========================================================================
    // CATEGORIES
    // =========================================================================

    pub async fn list_categories(&self, name: Option<&str>) -> AppResult<Vec<Category>> {
        self.repository.categories.list(name).await
    }

    pub async fn get_category(&self, id: i32) -> AppResult<CategoryDetails> {
        let category = self.repository.categories.get_by_id(id).await?;
        let books = self
            .repository
            .books
            .search(&BookQuery {
                category_id: Some(id),
                ..Default::default()
            })
            .await?;
        Ok(CategoryDetails { category, books })
    }

    pub async fn create_category(&self, mut category: CategoryPayload) -> AppResult<Category> {
        let mut errors = field_errors(category.clean())?;
        if self.repository.categories.name_exists(&category.name, None).await? {
            errors.add("name", "A category with this name already exists");
        }
        errors.into_result()?;

        self.repository.categories.create(&category).await
    }

    pub async fn update_category(&self, id: i32, mut category: CategoryPayload) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await?;

        let mut errors = field_errors(category.clean())?;
        if self
            .repository
            .categories
            .name_exists(&category.name, Some(id))
            .await?
        {
            errors.add("name", "A category with this name already exists");
        }
        errors.into_result()?;

        self.repository.categories.update(id, &category).await
    }

    /// Delete a category; its books stay in the catalog without a category
    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        let report = self.repository.delete(&deletion::CATEGORIES, id).await?;
        tracing::info!(
            "Deleted category {}: {} book(s) uncategorised",
            id,
            report.count("books", DeletePolicy::Nullify)
        );
        Ok(())
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    pub async fn search_books(&self, query: &BookQuery) -> AppResult<Vec<BookShort>> {
        self.repository.books.search(query).await
    }

    pub async fn available_books(&self) -> AppResult<Vec<BookShort>> {
        self.repository
            .books
            .search(&BookQuery {
                status: Some(BookStatus::Available),
                ..Default::default()
            })
            .await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<BookDetails> {
        self.repository.books.get_details(id).await
    }

    /// Constraints needing the store: referenced rows exist, ISBN unused by another book
    async fn check_book(
        &self,
        book: &mut BookPayload,
        id: Option<i32>,
        current: BookStatus,
    ) -> AppResult<()> {
        let mut errors = field_errors(book.clean(current))?;

        if !self.repository.authors.exists(book.author_id).await? {
            errors.add("author_id", format!("Author with id {} does not exist", book.author_id));
        }
        if let Some(category_id) = book.category_id {
            if !self.repository.categories.exists(category_id).await? {
                errors.add("category_id", format!("Category with id {} does not exist", category_id));
            }
        }
        if let Some(ref isbn) = book.isbn {
            if self.repository.books.isbn_exists(isbn, id).await? {
                errors.add("isbn", "A book with this ISBN already exists");
            }
        }

        errors.into_result()
    }

    pub async fn create_book(&self, mut book: BookPayload) -> AppResult<Book> {
        self.check_book(&mut book, None, BookStatus::default()).await?;
        let created = self.repository.books.create(&book).await?;
        tracing::info!("Created book {} ({})", created.id, created.title);
        Ok(created)
    }

    pub async fn update_book(&self, id: i32, mut book: BookPayload) -> AppResult<Book> {
        let existing = self.repository.books.get_by_id(id).await?;
        self.check_book(&mut book, Some(id), existing.status).await?;
        self.repository.books.update(id, &book).await
    }

    /// Delete a book and its borrow records
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        let report = self.repository.delete(&deletion::BOOKS, id).await?;

        tracing::info!(
            "Deleted book {}: {} borrow record(s) cascaded",
            id,
            report.count("borrow_records", DeletePolicy::Cascade)
        );

        self.media.remove_all(report.files).await;
        Ok(())
    }

    /// Store an uploaded cover and attach it to the book, replacing any previous one
    pub async fn set_cover(&self, id: i32, bytes: &[u8]) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await?;

        let path = self.media.store_cover(bytes).await?;
        match self.repository.books.set_cover(id, &path).await {
            Ok(previous) => self.media.remove_all(previous).await,
            Err(e) => {
                self.media.remove_all([path.as_str()]).await;
                return Err(e);
            }
        }

        self.repository.books.get_by_id(id).await
    }

    /// Cover bytes and content type
    pub async fn get_cover(&self, id: i32) -> AppResult<(Vec<u8>, &'static str)> {
        let book = self.repository.books.get_by_id(id).await?;
        let path = book
            .cover_image
            .ok_or_else(|| AppError::NotFound(format!("Book {} has no cover image", id)))?;
        self.media.read(&path).await
    }
}
