//! Author model and related types

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

/// Author row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Author {
    pub id: i32,
    pub firstname: String,
    pub lastname: String,
    pub birth_date: NaiveDate,
    pub nationality: String,
    pub biography: String,
    /// False once the author has been deleted
    pub active: bool,
}

/// Author with computed fields for display
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuthorDetails {
    pub id: i32,
    pub firstname: String,
    pub lastname: String,
    pub birth_date: NaiveDate,
    pub nationality: String,
    pub biography: String,
    pub active: bool,
    pub full_name: String,
    pub books_published: i64,
}

/// Author summary embedded in book representations
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorShort {
    pub id: i32,
    pub full_name: String,
}

/// Birth dates must lie strictly in the past.
pub fn validate_birth_date(date: &NaiveDate) -> Result<(), ValidationError> {
    if *date >= Utc::now().date_naive() {
        let mut error = ValidationError::new("birth_date_in_future");
        error.message = Some("Birth date must be in the past".into());
        return Err(error);
    }
    Ok(())
}

/// Create (or fully replace) author request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateAuthor {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub firstname: String,
    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub lastname: String,
    #[validate(custom(function = "validate_birth_date"))]
    pub birth_date: NaiveDate,
    #[validate(length(min = 1, max = 50, message = "Nationality must be 1-50 characters"))]
    pub nationality: String,
    #[serde(default)]
    pub biography: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial author update
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAuthor {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub firstname: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub lastname: Option<String>,
    #[validate(custom(function = "validate_birth_date"))]
    pub birth_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 50, message = "Nationality must be 1-50 characters"))]
    pub nationality: Option<String>,
    pub biography: Option<String>,
    pub active: Option<bool>,
}

impl From<CreateAuthor> for UpdateAuthor {
    fn from(author: CreateAuthor) -> Self {
        Self {
            firstname: Some(author.firstname),
            lastname: Some(author.lastname),
            birth_date: Some(author.birth_date),
            nationality: Some(author.nationality),
            biography: Some(author.biography),
            active: Some(author.active),
        }
    }
}

/// Author list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct AuthorQuery {
    /// Case-insensitive exact nationality
    pub nationality: Option<String>,
    /// Case-insensitive substring of first or last name
    pub search: Option<String>,
    /// firstname, lastname or birth_date, prefixed with '-' for descending order
    pub ordering: Option<String>,
}
