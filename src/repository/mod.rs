//! Repository layer for database operations

pub mod authors;
pub mod books;
pub mod categories;
pub mod loans;
pub mod users;

use sqlx::{Pool, Postgres};

use crate::error::AppError;

const UNIQUE_VIOLATION: &str = "23505";
const SERIALIZATION_FAILURE: &str = "40001";

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub authors: authors::AuthorsRepository,
    pub categories: categories::CategoriesRepository,
    pub books: books::BooksRepository,
    pub loans: loans::LoansRepository,
    pub users: users::UsersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            authors: authors::AuthorsRepository::new(pool.clone()),
            categories: categories::CategoriesRepository::new(pool.clone()),
            books: books::BooksRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Unique violations become `Conflict(duplicate)`, serialization failures a
/// retryable `Conflict`; anything else stays a database error.
pub(crate) fn map_write_error(error: sqlx::Error, duplicate: &str) -> AppError {
    if let sqlx::Error::Database(ref db) = error {
        match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return AppError::Conflict(duplicate.to_string()),
            Some(SERIALIZATION_FAILURE) => {
                return AppError::Conflict(
                    "Concurrent update detected, please retry".to_string(),
                )
            }
            _ => {}
        }
    }
    AppError::Database(error)
}

/// Same as [`map_write_error`] for errors already lifted into `AppError`
pub(crate) fn into_conflict(error: AppError, duplicate: &str) -> AppError {
    match error {
        AppError::Database(e) => map_write_error(e, duplicate),
        other => other,
    }
}

/// ILIKE pattern matching `term` anywhere, with wildcards in `term` escaped
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// ORDER BY clause from a user supplied `field` / `-field`, restricted to `allowed`
pub(crate) fn order_clause(ordering: Option<&str>, allowed: &[(&str, &str)], default: &str) -> String {
    let Some(ordering) = ordering.map(str::trim).filter(|o| !o.is_empty()) else {
        return default.to_string();
    };

    let (field, direction) = match ordering.strip_prefix('-') {
        Some(field) => (field, "DESC"),
        None => (ordering, "ASC"),
    };

    allowed
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, column)| format!("{} {}", column, direction))
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[(&str, &str)] = &[("title", "b.title"), ("price", "b.price")];

    #[test]
    fn test_order_clause() {
        assert_eq!(order_clause(Some("title"), FIELDS, "b.id"), "b.title ASC");
        assert_eq!(order_clause(Some("-price"), FIELDS, "b.id"), "b.price DESC");
        assert_eq!(order_clause(None, FIELDS, "b.id"), "b.id");
        assert_eq!(order_clause(Some(""), FIELDS, "b.id"), "b.id");
    }

    #[test]
    fn test_order_clause_rejects_unknown_fields() {
        assert_eq!(order_clause(Some("title; DROP TABLE books"), FIELDS, "b.id"), "b.id");
        assert_eq!(order_clause(Some("-isbn"), FIELDS, "b.id"), "b.id");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("garcia"), "%garcia%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = into_conflict(AppError::NotFound("x".into()), "dup");
        assert!(matches!(err, AppError::NotFound(_)));
        let err = map_write_error(sqlx::Error::RowNotFound, "dup");
        assert!(matches!(err, AppError::Database(_)));
    }
}
