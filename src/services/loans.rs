//! Loan management service

use chrono::{NaiveDate, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{CreateLoan, Loan, LoanDetails, LoanQuery, LoanStats, ReturnOutcome},
        user::Principal,
    },
    policy::{self, LoanPolicy},
    repository::Repository,
};

/// Whose loans the statistics cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsScope {
    User(i32),
    All,
}

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    policy: LoanPolicy,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl LoansService {
    pub fn new(repository: Repository, policy: LoanPolicy) -> Self {
        Self { repository, policy }
    }

    /// Create a new loan (borrow a book)
    pub async fn create_loan(&self, requester: Principal, request: CreateLoan) -> AppResult<Loan> {
        let borrower = self.policy.resolve_borrower(requester, request.user_id)?;

        let loan = self
            .repository
            .loans
            .create(borrower, request.book_id, &self.policy, today())
            .await?;

        tracing::info!(
            "Loan {} created: user={} book={} expected_return={}",
            loan.id,
            loan.user_id,
            loan.book_id,
            loan.expected_return
        );
        Ok(loan)
    }

    /// Return a borrowed book and compute the late fee
    pub async fn return_loan(
        &self,
        loan_id: i32,
        requester: Principal,
        confirm: Option<bool>,
    ) -> AppResult<ReturnOutcome> {
        policy::require_confirmation(confirm)?;

        let outcome = self
            .repository
            .loans
            .return_loan(loan_id, requester, &self.policy, today())
            .await?;

        tracing::info!(
            "Loan {} returned: book={} fine={}",
            outcome.loan.id,
            outcome.loan.book_id,
            outcome.fine
        );
        Ok(outcome)
    }

    /// Get a loan visible to the requester
    pub async fn get_loan(&self, loan_id: i32, requester: Principal) -> AppResult<LoanDetails> {
        let loan = self.repository.loans.get_details(loan_id, today()).await?;

        if loan.user_id != requester.user_id && !requester.is_admin {
            return Err(AppError::Authorization(
                "You may only view your own loans".to_string(),
            ));
        }
        Ok(loan)
    }

    /// List the requester's loans; administrators see everyone's unless filtered
    pub async fn list_loans(&self, requester: Principal, query: &LoanQuery) -> AppResult<Vec<LoanDetails>> {
        let user_id = match query.user_id {
            Some(user_id) if user_id != requester.user_id && !requester.is_admin => {
                return Err(AppError::Authorization(
                    "You may only list your own loans".to_string(),
                ))
            }
            Some(user_id) => Some(user_id),
            None if requester.is_admin => None,
            None => Some(requester.user_id),
        };

        self.repository
            .loans
            .list(user_id, query.active, query.overdue, today())
            .await
    }

    /// Active, overdue and fine totals for a user or the whole library
    pub async fn stats(&self, scope: StatsScope) -> AppResult<LoanStats> {
        let user_id = match scope {
            StatsScope::User(user_id) => {
                self.repository.users.get_by_id(user_id).await?;
                Some(user_id)
            }
            StatsScope::All => None,
        };

        let counters = self
            .repository
            .loans
            .counters(user_id, &self.policy, today())
            .await?;

        Ok(LoanStats {
            active_count: counters.active,
            overdue_count: counters.overdue,
            total_fines: counters.total_fines,
        })
    }
}
