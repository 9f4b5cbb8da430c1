//! Circulation service: lending, returning and the borrow ledger

use chrono::Utc;

use crate::{
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::{
        book::non_blank,
        borrow::{
            resolve_due_date, BorrowQuery, BorrowRecordDetails, BorrowRequest, LedgerQuery,
            NewBorrowRecord, ReturnRequest,
        },
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    config: CirculationConfig,
}

impl CirculationService {
    pub fn new(repository: Repository, config: CirculationConfig) -> Self {
        Self { repository, config }
    }

    /// Lend a book to a borrower
    pub async fn borrow(&self, request: BorrowRequest) -> AppResult<BorrowRecordDetails> {
        let now = Utc::now();

        // Existence of the borrower is checked up front for a clean 404
        self.repository.users.get_by_id(request.borrower_id).await?;

        let record = NewBorrowRecord {
            book_id: request.book_id,
            borrower_id: request.borrower_id,
            borrow_date: now,
            due_date: resolve_due_date(now, request.due_date, self.config.default_loan_days),
            notes: non_blank(request.notes),
        };

        let id = match self.repository.borrows.open(&record).await {
            Ok(id) => id,
            Err(e @ AppError::Conflict(_)) => {
                tracing::warn!(
                    "Refused to lend book {} to user {}: {}",
                    record.book_id,
                    record.borrower_id,
                    e
                );
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            "Book {} lent to user {} until {} (record {})",
            record.book_id,
            record.borrower_id,
            record.due_date,
            id
        );

        self.repository.borrows.get_details(id, now).await
    }

    /// Close an open borrow record and make its book available again
    pub async fn return_book(&self, id: i32, request: ReturnRequest) -> AppResult<BorrowRecordDetails> {
        let now = Utc::now();

        let closed = match self
            .repository
            .borrows
            .close(id, now, request.return_date, request.notes)
            .await
        {
            Ok(closed) => closed,
            Err(e @ AppError::AlreadyReturned(_)) => {
                tracing::warn!("Duplicate return of borrow record {}", id);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        if closed.due_date < closed.return_date.unwrap_or(now) {
            tracing::info!("Book {} returned late (record {})", closed.book_id, id);
        } else {
            tracing::info!("Book {} returned (record {})", closed.book_id, id);
        }

        self.repository.borrows.get_details(id, now).await
    }

    pub async fn get(&self, id: i32) -> AppResult<BorrowRecordDetails> {
        self.repository.borrows.get_details(id, Utc::now()).await
    }

    /// Full ledger with optional filters
    pub async fn list(&self, query: &BorrowQuery) -> AppResult<Vec<BorrowRecordDetails>> {
        self.repository.borrows.search(query, Utc::now()).await
    }

    /// Open records, i.e. books currently out
    pub async fn borrow_list(&self, query: LedgerQuery) -> AppResult<Vec<BorrowRecordDetails>> {
        self.list(&query.with_returned(false)).await
    }

    /// Closed records
    pub async fn return_list(&self, query: LedgerQuery) -> AppResult<Vec<BorrowRecordDetails>> {
        self.list(&query.with_returned(true)).await
    }

    /// Loans of one user; open ones unless `is_returned` says otherwise
    pub async fn user_borrows(&self, user_id: i32, query: BorrowQuery) -> AppResult<Vec<BorrowRecordDetails>> {
        self.repository.users.get_by_id(user_id).await?;
        self.list(&BorrowQuery {
            borrower_id: Some(user_id),
            is_returned: query.is_returned.or(Some(false)),
            ..query
        })
        .await
    }
}
