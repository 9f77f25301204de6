//! Loans repository for database operations
//!
//! Loan creation and return each run in a single SERIALIZABLE transaction
//! with the borrower, book and loan rows locked, so the loan cap and book
//! availability cannot be raced by concurrent requests.

use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookStatus,
        loan::{Loan, LoanDetails, LoanDetailsRow, ReturnOutcome},
        user::Principal,
    },
    policy::{BorrowerSnapshot, LoanPolicy},
};

use super::into_conflict;

const DETAILS_SELECT: &str = r#"
    SELECT l.id, l.user_id, u.username, l.book_id,
           b.title AS book_title, b.isbn AS book_isbn,
           l.created_at, l.expected_return, l.returned_on, l.active
    FROM loans l
    JOIN users u ON u.id = l.user_id
    JOIN books b ON b.id = l.book_id
"#;

/// Aggregates behind the loan statistics
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct LoanCounters {
    pub active: i64,
    pub overdue: i64,
    /// Sum of each returned loan's capped late fee
    pub total_fines: i64,
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan details by ID
    pub async fn get_details(&self, id: i32, today: NaiveDate) -> AppResult<LoanDetails> {
        let query = format!("{} WHERE l.id = $1", DETAILS_SELECT);
        sqlx::query_as::<_, LoanDetailsRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| LoanDetails::from_row(row, today))
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// List loans, optionally restricted to one user and by active/overdue state
    pub async fn list(
        &self,
        user_id: Option<i32>,
        active: Option<bool>,
        overdue: Option<bool>,
        today: NaiveDate,
    ) -> AppResult<Vec<LoanDetails>> {
        let query = format!(
            r#"{}
            WHERE ($1::int IS NULL OR l.user_id = $1)
              AND ($2::bool IS NULL OR l.active = $2)
              AND ($3::bool IS NULL OR (l.active AND l.expected_return < $4) = $3)
            ORDER BY l.created_at DESC, l.id DESC
            "#,
            DETAILS_SELECT
        );

        let rows = sqlx::query_as::<_, LoanDetailsRow>(&query)
            .bind(user_id)
            .bind(active)
            .bind(overdue)
            .bind(today)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| LoanDetails::from_row(row, today))
            .collect())
    }

    /// Create a loan for `user_id` if the policy allows it, and mark the book borrowed
    pub async fn create(
        &self,
        user_id: i32,
        book_id: i32,
        policy: &LoanPolicy,
        today: NaiveDate,
    ) -> AppResult<Loan> {
        self.create_in_transaction(user_id, book_id, policy, today)
            .await
            .map_err(|e| into_conflict(e, "The book is already on loan"))
    }

    async fn create_in_transaction(
        &self,
        user_id: i32,
        book_id: i32,
        policy: &LoanPolicy,
        today: NaiveDate,
    ) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        // Lock the borrower first: concurrent loans for the same user queue here
        sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))?;

        let book_status: BookStatus =
            sqlx::query_scalar("SELECT status FROM books WHERE id = $1 FOR UPDATE")
                .bind(book_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        let (active_loans, overdue_loans): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE expected_return < $2)
            FROM loans
            WHERE user_id = $1 AND active
            "#,
        )
        .bind(user_id)
        .bind(today)
        .fetch_one(&mut *tx)
        .await?;

        let borrower = BorrowerSnapshot {
            user_id,
            active_loans,
            overdue_loans,
        };
        policy.check_borrow(&borrower, book_id, book_status)?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (user_id, book_id, expected_return)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(policy.due_date(today))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE books SET status = $1 WHERE id = $2")
            .bind(BookStatus::Borrowed.as_str())
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(loan)
    }

    /// Close a loan, make its book available again and compute the late fee
    pub async fn return_loan(
        &self,
        loan_id: i32,
        requester: Principal,
        policy: &LoanPolicy,
        today: NaiveDate,
    ) -> AppResult<ReturnOutcome> {
        self.return_in_transaction(loan_id, requester, policy, today)
            .await
            .map_err(|e| into_conflict(e, "The loan was modified concurrently"))
    }

    async fn return_in_transaction(
        &self,
        loan_id: i32,
        requester: Principal,
        policy: &LoanPolicy,
        today: NaiveDate,
    ) -> AppResult<ReturnOutcome> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(loan_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        policy.check_return(&loan, requester)?;

        let returned = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET returned_on = $1, active = FALSE
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(today)
        .bind(loan_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE books SET status = $1 WHERE id = $2")
            .bind(BookStatus::Available.as_str())
            .bind(loan.book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let fine = policy.fine(returned.expected_return, today);
        Ok(ReturnOutcome { loan: returned, fine })
    }

    /// Active/overdue counts and fines owed, for one user or everyone.
    ///
    /// Per loan fine is `LEAST(cap, GREATEST(0, days_late * rate))`, the same
    /// formula as `policy::late_fee`.
    pub async fn counters(
        &self,
        user_id: Option<i32>,
        policy: &LoanPolicy,
        today: NaiveDate,
    ) -> AppResult<LoanCounters> {
        let counters = sqlx::query_as::<_, LoanCounters>(
            r#"
            SELECT COUNT(*) FILTER (WHERE active) AS active,
                   COUNT(*) FILTER (WHERE active AND returned_on IS NULL AND expected_return < $2) AS overdue,
                   COALESCE(SUM(LEAST($4, GREATEST(0, (returned_on - expected_return)::bigint * $3)))
                            FILTER (WHERE returned_on IS NOT NULL), 0)::bigint AS total_fines
            FROM loans
            WHERE ($1::int IS NULL OR user_id = $1)
            "#,
        )
        .bind(user_id)
        .bind(today)
        .bind(policy.daily_fine())
        .bind(policy.max_fine())
        .fetch_one(&self.pool)
        .await?;

        Ok(counters)
    }
}
