//! Loan (borrow) model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::book::BookShort;

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub created_at: DateTime<Utc>,
    pub expected_return: NaiveDate,
    pub returned_on: Option<NaiveDate>,
    pub active: bool,
}

impl Loan {
    /// Active, unreturned and past its expected return date
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.active && self.returned_on.is_none() && today > self.expected_return
    }

    /// Days left until the expected return date (negative once overdue)
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        (self.expected_return - today).num_days()
    }
}

/// Human readable due state, e.g. "3 days left"
pub fn due_label(days_remaining: i64) -> String {
    match days_remaining {
        d if d < 0 => "Overdue".to_string(),
        0 => "Due today".to_string(),
        1 => "1 day left".to_string(),
        d => format!("{} days left", d),
    }
}

/// Internal row structure for loan listing queries
#[derive(Debug, Clone, FromRow)]
pub struct LoanDetailsRow {
    id: i32,
    user_id: i32,
    username: String,
    book_id: i32,
    book_title: String,
    book_isbn: String,
    created_at: DateTime<Utc>,
    expected_return: NaiveDate,
    returned_on: Option<NaiveDate>,
    active: bool,
}

/// Loan with book summary and derived due state
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub book: BookShort,
    pub created_at: DateTime<Utc>,
    pub expected_return: NaiveDate,
    pub returned_on: Option<NaiveDate>,
    pub active: bool,
    pub days_remaining: i64,
    pub is_overdue: bool,
    pub due_label: String,
}

impl LoanDetails {
    pub fn from_row(row: LoanDetailsRow, today: NaiveDate) -> Self {
        let loan = Loan {
            id: row.id,
            user_id: row.user_id,
            book_id: row.book_id,
            created_at: row.created_at,
            expected_return: row.expected_return,
            returned_on: row.returned_on,
            active: row.active,
        };
        let days_remaining = loan.days_remaining(today);
        let due_label = if loan.active {
            due_label(days_remaining)
        } else {
            "Returned".to_string()
        };

        LoanDetails {
            id: loan.id,
            user_id: loan.user_id,
            username: row.username,
            book: BookShort {
                id: row.book_id,
                title: row.book_title,
                isbn: row.book_isbn,
            },
            created_at: loan.created_at,
            expected_return: loan.expected_return,
            returned_on: loan.returned_on,
            active: loan.active,
            days_remaining,
            is_overdue: loan.is_overdue(today),
            due_label,
        }
    }
}

/// Create loan request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateLoan {
    pub book_id: i32,
    /// Borrower; only administrators may name someone other than themselves
    pub user_id: Option<i32>,
}

/// Return loan request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReturnLoan {
    /// Must be true for the return to proceed
    #[serde(default)]
    pub confirm: Option<bool>,
}

/// Loan list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    pub active: Option<bool>,
    pub overdue: Option<bool>,
    /// Administrators only
    pub user_id: Option<i32>,
}

/// Outcome of a successful return
#[derive(Debug, Clone)]
pub struct ReturnOutcome {
    pub loan: Loan,
    pub fine: i64,
}

/// Loan counters for a user or for the whole library
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanStats {
    pub active_count: i64,
    pub overdue_count: i64,
    pub total_fines: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn loan(expected_return: NaiveDate, returned_on: Option<NaiveDate>) -> Loan {
        Loan {
            id: 1,
            user_id: 1,
            book_id: 1,
            created_at: Utc::now(),
            expected_return,
            returned_on,
            active: returned_on.is_none(),
        }
    }

    #[test]
    fn test_overdue_only_after_expected_date() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert!(!loan(today, None).is_overdue(today));
        assert!(loan(today - Duration::days(1), None).is_overdue(today));
        assert!(!loan(today - Duration::days(1), Some(today)).is_overdue(today));
    }

    #[test]
    fn test_due_label() {
        assert_eq!(due_label(-2), "Overdue");
        assert_eq!(due_label(0), "Due today");
        assert_eq!(due_label(1), "1 day left");
        assert_eq!(due_label(12), "12 days left");
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = LoanStats {
            active_count: 2,
            overdue_count: 1,
            total_fines: 50,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["activeCount"], 2);
        assert_eq!(json["overdueCount"], 1);
        assert_eq!(json["totalFines"], 50);
    }

    #[test]
    fn test_returned_loan_details() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let row = LoanDetailsRow {
            id: 7,
            user_id: 2,
            username: "ana".into(),
            book_id: 3,
            book_title: "Rayuela".into(),
            book_isbn: "9788437604572".into(),
            created_at: Utc::now(),
            expected_return: today - Duration::days(4),
            returned_on: Some(today),
            active: false,
        };
        let details = LoanDetails::from_row(row, today);
        assert!(!details.is_overdue);
        assert_eq!(details.due_label, "Returned");
        assert_eq!(details.book.title, "Rayuela");
    }
}
