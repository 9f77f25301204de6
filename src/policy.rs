//! Loan rules.
//!
//! Everything here is a pure function over explicit inputs: the requester,
//! a snapshot of the borrower's ledger read inside the loan transaction, and
//! `today`. The repository layer supplies the snapshot and persists the
//! outcome; no database access happens in this module.

use chrono::{Duration, NaiveDate};

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{book::BookStatus, loan::Loan, user::Principal},
};

/// Late fee for a loan expected back on `expected` and returned on `actual`.
///
/// `min(cap, max(0, days_late * daily_rate))`
pub fn late_fee(expected: NaiveDate, actual: NaiveDate, daily_rate: i64, cap: i64) -> i64 {
    let days_late = (actual - expected).num_days();
    if days_late <= 0 {
        return 0;
    }
    days_late.saturating_mul(daily_rate).min(cap)
}

/// Borrower state read under lock before a new loan is committed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BorrowerSnapshot {
    pub user_id: i32,
    pub active_loans: i64,
    pub overdue_loans: i64,
}

#[derive(Debug, Clone)]
pub struct LoanPolicy {
    max_active_loans: i64,
    duration_days: i64,
    daily_fine: i64,
    max_fine: i64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self::new(&LoansConfig::default())
    }
}

impl LoanPolicy {
    pub fn new(config: &LoansConfig) -> Self {
        Self {
            max_active_loans: config.max_active_loans,
            duration_days: config.duration_days,
            daily_fine: config.daily_fine,
            max_fine: config.max_fine,
        }
    }

    /// Expected return date for a loan created on `today`
    pub fn due_date(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(self.duration_days)
    }

    pub fn fine(&self, expected: NaiveDate, actual: NaiveDate) -> i64 {
        late_fee(expected, actual, self.daily_fine, self.max_fine)
    }

    /// Fine per day late; the statistics query sums fines in SQL with this rate
    pub fn daily_fine(&self) -> i64 {
        self.daily_fine
    }

    /// Upper bound of a single loan's fine
    pub fn max_fine(&self) -> i64 {
        self.max_fine
    }

    /// Who the loan is for. Only administrators may borrow on behalf of another user.
    pub fn resolve_borrower(&self, requester: Principal, requested: Option<i32>) -> AppResult<i32> {
        match requested {
            Some(user_id) if user_id != requester.user_id && !requester.is_admin => {
                Err(AppError::Validation(
                    "Only administrators may create loans for other users".to_string(),
                ))
            }
            Some(user_id) => Ok(user_id),
            None => Ok(requester.user_id),
        }
    }

    /// Checks run, in order: loan cap, book availability, outstanding overdue loans.
    pub fn check_borrow(
        &self,
        borrower: &BorrowerSnapshot,
        book_id: i32,
        book_status: BookStatus,
    ) -> AppResult<()> {
        if borrower.active_loans >= self.max_active_loans {
            return Err(AppError::LoanLimitReached {
                active: borrower.active_loans,
                max: self.max_active_loans,
            });
        }

        if book_status != BookStatus::Available {
            return Err(AppError::BookUnavailable {
                book_id,
                status: book_status.to_string(),
            });
        }

        if borrower.overdue_loans > 0 {
            return Err(AppError::OverdueLoans {
                user_id: borrower.user_id,
                count: borrower.overdue_loans,
            });
        }

        Ok(())
    }

    /// Only the borrower or an administrator may return a loan, and only once.
    pub fn check_return(&self, loan: &Loan, requester: Principal) -> AppResult<()> {
        if loan.user_id != requester.user_id && !requester.is_admin {
            return Err(AppError::Authorization(
                "Only the borrower or an administrator may return this loan".to_string(),
            ));
        }

        if !loan.active || loan.returned_on.is_some() {
            return Err(AppError::AlreadyReturned(loan.id));
        }

        Ok(())
    }
}

/// Manual status changes: `borrowed` is owned by the loan flow, so it can be
/// neither set by hand nor left by hand.
pub fn check_manual_status(current: BookStatus, requested: Option<BookStatus>) -> AppResult<()> {
    let requested = match requested {
        Some(status) if status != current => status,
        _ => return Ok(()),
    };

    if requested == BookStatus::Borrowed {
        return Err(AppError::Validation(
            "A book becomes borrowed only by creating a loan".to_string(),
        ));
    }

    if current == BookStatus::Borrowed {
        return Err(AppError::Conflict(
            "The book is on loan; return it before changing its status".to_string(),
        ));
    }

    Ok(())
}

/// The return confirmation flag must be explicitly true.
pub fn require_confirmation(confirm: Option<bool>) -> AppResult<()> {
    if confirm == Some(true) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Return must be confirmed with {\"confirm\": true}".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn user(user_id: i32) -> Principal {
        Principal {
            user_id,
            is_admin: false,
        }
    }

    fn admin(user_id: i32) -> Principal {
        Principal {
            user_id,
            is_admin: true,
        }
    }

    fn active_loan(user_id: i32) -> Loan {
        let today = Utc::now().date_naive();
        Loan {
            id: 10,
            user_id,
            book_id: 3,
            created_at: Utc::now(),
            expected_return: today + Duration::days(15),
            returned_on: None,
            active: true,
        }
    }

    #[test]
    fn test_fine_ten_days_late() {
        let today = date(2024, 3, 20);
        assert_eq!(late_fee(today - Duration::days(10), today, 5, 500), 50);
    }

    #[test]
    fn test_fine_capped() {
        let today = date(2024, 3, 20);
        assert_eq!(late_fee(today - Duration::days(200), today, 5, 500), 500);
        assert_eq!(late_fee(today - Duration::days(100), today, 5, 500), 500);
        assert_eq!(late_fee(today - Duration::days(99), today, 5, 500), 495);
    }

    #[test]
    fn test_no_fine_on_time_or_early() {
        let expected = date(2024, 3, 20);
        assert_eq!(late_fee(expected, expected, 5, 500), 0);
        assert_eq!(late_fee(expected, expected - Duration::days(4), 5, 500), 0);
    }

    #[test]
    fn test_fine_matches_formula_over_range() {
        let expected = date(2024, 1, 1);
        for offset in -30..=150 {
            let actual = expected + Duration::days(offset);
            assert_eq!(late_fee(expected, actual, 5, 500), (offset * 5).clamp(0, 500));
        }
    }

    #[test]
    fn test_rates_agree_with_fine() {
        let policy = LoanPolicy::default();
        assert_eq!((policy.daily_fine(), policy.max_fine()), (5, 500));

        let expected = date(2024, 1, 1);
        for days_late in [-3, 0, 1, 10, 99, 100, 300] {
            let actual = expected + Duration::days(days_late);
            let sql_equivalent = (days_late * policy.daily_fine()).max(0).min(policy.max_fine());
            assert_eq!(policy.fine(expected, actual), sql_equivalent);
        }
    }

    #[test]
    fn test_due_date_fifteen_days_out() {
        let policy = LoanPolicy::default();
        assert_eq!(policy.due_date(date(2024, 2, 20)), date(2024, 3, 6));
    }

    #[test]
    fn test_borrower_defaults_to_requester() {
        let policy = LoanPolicy::default();
        assert_eq!(policy.resolve_borrower(user(4), None).unwrap(), 4);
        assert_eq!(policy.resolve_borrower(user(4), Some(4)).unwrap(), 4);
    }

    #[test]
    fn test_only_admin_borrows_for_others() {
        let policy = LoanPolicy::default();
        let err = policy.resolve_borrower(user(4), Some(9)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(policy.resolve_borrower(admin(1), Some(9)).unwrap(), 9);
    }

    #[test]
    fn test_borrow_allowed() {
        let policy = LoanPolicy::default();
        let borrower = BorrowerSnapshot {
            user_id: 1,
            active_loans: 2,
            overdue_loans: 0,
        };
        assert!(policy.check_borrow(&borrower, 1, BookStatus::Available).is_ok());
    }

    #[test]
    fn test_loan_cap() {
        let policy = LoanPolicy::default();
        let borrower = BorrowerSnapshot {
            user_id: 1,
            active_loans: 3,
            overdue_loans: 0,
        };
        let err = policy.check_borrow(&borrower, 1, BookStatus::Available).unwrap_err();
        assert!(matches!(err, AppError::LoanLimitReached { active: 3, max: 3 }));
    }

    #[test]
    fn test_book_must_be_available() {
        let policy = LoanPolicy::default();
        let borrower = BorrowerSnapshot {
            user_id: 1,
            ..Default::default()
        };
        for status in [BookStatus::Borrowed, BookStatus::Maintenance] {
            let err = policy.check_borrow(&borrower, 8, status).unwrap_err();
            assert!(matches!(err, AppError::BookUnavailable { book_id: 8, .. }));
        }
    }

    #[test]
    fn test_overdue_blocks_new_loans() {
        let policy = LoanPolicy::default();
        let borrower = BorrowerSnapshot {
            user_id: 1,
            active_loans: 1,
            overdue_loans: 1,
        };
        let err = policy.check_borrow(&borrower, 1, BookStatus::Available).unwrap_err();
        assert!(matches!(err, AppError::OverdueLoans { user_id: 1, count: 1 }));
    }

    #[test]
    fn test_custom_cap_from_config() {
        let policy = LoanPolicy::new(&LoansConfig {
            max_active_loans: 1,
            ..Default::default()
        });
        let borrower = BorrowerSnapshot {
            user_id: 1,
            active_loans: 1,
            overdue_loans: 0,
        };
        assert!(policy.check_borrow(&borrower, 1, BookStatus::Available).is_err());
    }

    #[test]
    fn test_return_by_owner_or_admin() {
        let policy = LoanPolicy::default();
        let loan = active_loan(4);
        assert!(policy.check_return(&loan, user(4)).is_ok());
        assert!(policy.check_return(&loan, admin(1)).is_ok());
        let err = policy.check_return(&loan, user(5)).unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[test]
    fn test_second_return_rejected() {
        let policy = LoanPolicy::default();
        let mut loan = active_loan(4);
        loan.active = false;
        loan.returned_on = Some(Utc::now().date_naive());
        let err = policy.check_return(&loan, user(4)).unwrap_err();
        assert!(matches!(err, AppError::AlreadyReturned(10)));
    }

    #[test]
    fn test_manual_status_changes() {
        use BookStatus::*;
        assert!(check_manual_status(Available, Some(Maintenance)).is_ok());
        assert!(check_manual_status(Maintenance, Some(Available)).is_ok());
        assert!(check_manual_status(Borrowed, None).is_ok());
        assert!(check_manual_status(Borrowed, Some(Borrowed)).is_ok());
        assert!(matches!(
            check_manual_status(Available, Some(Borrowed)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            check_manual_status(Borrowed, Some(Available)),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_confirmation_required() {
        assert!(require_confirmation(Some(true)).is_ok());
        assert!(matches!(require_confirmation(Some(false)), Err(AppError::Validation(_))));
        assert!(matches!(require_confirmation(None), Err(AppError::Validation(_))));
    }
}
