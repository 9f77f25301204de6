//! Book model and related types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::author::AuthorShort;

/// Book lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Available,
    Borrowed,
    Maintenance,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Borrowed => "borrowed",
            BookStatus::Maintenance => "maintenance",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            BookStatus::Available => "Available",
            BookStatus::Borrowed => "Borrowed",
            BookStatus::Maintenance => "Under maintenance",
        }
    }
}

impl Default for BookStatus {
    fn default() -> Self {
        BookStatus::Available
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(BookStatus::Available),
            "borrowed" => Ok(BookStatus::Borrowed),
            "maintenance" => Ok(BookStatus::Maintenance),
            _ => Err(format!("Invalid book status: {}", s)),
        }
    }
}

// Stored as text in the books.status column
impl sqlx::Type<Postgres> for BookStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for BookStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BookStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Book row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub isbn: String,
    pub publication_date: NaiveDate,
    pub page_count: i32,
    pub description: String,
    pub author_id: i32,
    pub category_id: Option<i32>,
    pub status: BookStatus,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Category summary embedded in book representations
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryShort {
    pub id: i32,
    pub name: String,
}

/// Book with author, category and status label
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookDetails {
    pub id: i32,
    pub title: String,
    pub isbn: String,
    pub publication_date: NaiveDate,
    pub page_count: i32,
    pub description: String,
    pub status: BookStatus,
    pub status_label: String,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub author: AuthorShort,
    pub category: Option<CategoryShort>,
}

/// Book summary embedded in loan representations
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub title: String,
    pub isbn: String,
}

/// ISBNs are exactly 13 ASCII digits.
pub fn validate_isbn(isbn: &str) -> Result<(), ValidationError> {
    if isbn.len() != 13 || !isbn.bytes().all(|b| b.is_ascii_digit()) {
        let mut error = ValidationError::new("isbn");
        error.message = Some("ISBN must be exactly 13 digits".into());
        return Err(error);
    }
    Ok(())
}

/// Prices fit NUMERIC(10,2): non-negative, below 10^8, at most two decimals.
pub fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    let message = if price.is_sign_negative() && !price.is_zero() {
        "Price cannot be negative"
    } else if *price >= Decimal::new(100_000_000, 0) {
        "Price must be below 100000000"
    } else if price.normalize().scale() > 2 {
        "Price cannot have more than 2 decimal places"
    } else {
        return Ok(());
    };

    let mut error = ValidationError::new("price");
    error.message = Some(message.into());
    Err(error)
}

/// Create (or fully replace) book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(custom(function = "validate_isbn"))]
    pub isbn: String,
    pub publication_date: NaiveDate,
    #[validate(range(min = 1, message = "Page count must be greater than 0"))]
    pub page_count: i32,
    #[serde(default)]
    pub description: String,
    pub author_id: i32,
    pub category_id: Option<i32>,
    #[validate(custom(function = "validate_price"))]
    #[schema(value_type = String, example = "19.90")]
    pub price: Decimal,
    /// Defaults to available; only available or maintenance may be set
    pub status: Option<BookStatus>,
}

/// Partial book update
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    #[validate(custom(function = "validate_isbn"))]
    pub isbn: Option<String>,
    pub publication_date: Option<NaiveDate>,
    #[validate(range(min = 1, message = "Page count must be greater than 0"))]
    pub page_count: Option<i32>,
    pub description: Option<String>,
    pub author_id: Option<i32>,
    /// Absent leaves the category untouched, null clears it
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<i32>)]
    pub category_id: Option<Option<i32>>,
    #[validate(custom(function = "validate_price"))]
    #[schema(value_type = Option<String>, example = "19.90")]
    pub price: Option<Decimal>,
    pub status: Option<BookStatus>,
}

impl From<CreateBook> for UpdateBook {
    fn from(book: CreateBook) -> Self {
        Self {
            title: Some(book.title),
            isbn: Some(book.isbn),
            publication_date: Some(book.publication_date),
            page_count: Some(book.page_count),
            description: Some(book.description),
            author_id: Some(book.author_id),
            category_id: Some(book.category_id),
            price: Some(book.price),
            status: book.status,
        }
    }
}

/// Book list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    pub status: Option<BookStatus>,
    pub author_id: Option<i32>,
    pub category_id: Option<i32>,
    /// Substring of the title or exact ISBN
    pub search: Option<String>,
    /// title, publication_date, price or created_at, prefixed with '-' for descending order
    pub ordering: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn request() -> CreateBook {
        CreateBook {
            title: "Cien años de soledad".into(),
            isbn: "9780307474728".into(),
            publication_date: NaiveDate::from_ymd_opt(1967, 5, 30).unwrap(),
            page_count: 417,
            description: String::new(),
            author_id: 1,
            category_id: None,
            price: Decimal::new(1990, 2),
            status: None,
        }
    }

    #[test]
    fn test_valid_book() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_isbn_format() {
        assert!(validate_isbn("9780307474728").is_ok());
        assert!(validate_isbn("978030747472").is_err());
        assert!(validate_isbn("97803074747280").is_err());
        assert!(validate_isbn("978-030747472").is_err());
        assert!(validate_isbn("97803074747２8").is_err());
    }

    #[test]
    fn test_page_count_must_be_positive() {
        let mut book = request();
        book.page_count = 0;
        assert!(book.validate().is_err());
    }

    #[test]
    fn test_price_not_negative() {
        let mut book = request();
        book.price = Decimal::ZERO;
        assert!(book.validate().is_ok());
        book.price = Decimal::new(-1, 2);
        assert!(book.validate().is_err());
    }

    #[test]
    fn test_price_fits_column() {
        let mut book = request();
        book.price = Decimal::new(99_999_999_99, 2);
        assert!(book.validate().is_ok());
        book.price = Decimal::new(100_000_000, 0);
        assert!(book.validate().is_err());
        book.price = Decimal::from_str("123456789012.345").unwrap();
        assert!(book.validate().is_err());
        book.price = Decimal::new(19_905, 3);
        assert!(book.validate().is_err());
        // trailing zeros beyond the second decimal are harmless
        book.price = Decimal::from_str("19.900").unwrap();
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [BookStatus::Available, BookStatus::Borrowed, BookStatus::Maintenance] {
            assert_eq!(BookStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(BookStatus::from_str("lost").is_err());
        assert_eq!(BookStatus::Maintenance.label(), "Under maintenance");
    }

    #[test]
    fn test_update_distinguishes_null_category() {
        let absent: UpdateBook = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert_eq!(absent.category_id, None);

        let cleared: UpdateBook = serde_json::from_str(r#"{"category_id": null}"#).unwrap();
        assert_eq!(cleared.category_id, Some(None));

        let set: UpdateBook = serde_json::from_str(r#"{"category_id": 4}"#).unwrap();
        assert_eq!(set.category_id, Some(Some(4)));
    }
}
