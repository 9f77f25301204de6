//! Authors repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::author::{Author, AuthorDetails, AuthorQuery, CreateAuthor, UpdateAuthor},
};

use super::{like_pattern, order_clause};

const DETAILS_SELECT: &str = r#"
    SELECT a.id, a.firstname, a.lastname, a.birth_date, a.nationality, a.biography, a.active,
           a.firstname || ' ' || a.lastname AS full_name,
           (SELECT COUNT(*) FROM books b WHERE b.author_id = a.id) AS books_published
    FROM authors a
"#;

const ORDERINGS: &[(&str, &str)] = &[
    ("firstname", "a.firstname"),
    ("lastname", "a.lastname"),
    ("birth_date", "a.birth_date"),
];

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get author by ID, including soft-deleted ones
    pub async fn get_by_id(&self, id: i32) -> AppResult<Author> {
        sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// Get an active author with computed fields
    pub async fn get_details(&self, id: i32) -> AppResult<AuthorDetails> {
        let query = format!("{} WHERE a.id = $1 AND a.active", DETAILS_SELECT);
        sqlx::query_as::<_, AuthorDetails>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// List active authors
    pub async fn list(&self, filter: &AuthorQuery) -> AppResult<Vec<AuthorDetails>> {
        let query = format!(
            r#"{}
            WHERE a.active
              AND ($1::text IS NULL OR LOWER(a.nationality) = LOWER($1))
              AND ($2::text IS NULL OR a.firstname ILIKE $2 OR a.lastname ILIKE $2)
            ORDER BY {}
            "#,
            DETAILS_SELECT,
            order_clause(filter.ordering.as_deref(), ORDERINGS, "a.lastname, a.firstname"),
        );

        let authors = sqlx::query_as::<_, AuthorDetails>(&query)
            .bind(filter.nationality.as_deref())
            .bind(filter.search.as_deref().map(like_pattern))
            .fetch_all(&self.pool)
            .await?;

        Ok(authors)
    }

    pub async fn create(&self, author: &CreateAuthor) -> AppResult<Author> {
        let created = sqlx::query_as::<_, Author>(
            r#"
            INSERT INTO authors (firstname, lastname, birth_date, nationality, biography, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&author.firstname)
        .bind(&author.lastname)
        .bind(author.birth_date)
        .bind(&author.nationality)
        .bind(&author.biography)
        .bind(author.active)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update the fields present in `author`
    pub async fn update(&self, id: i32, author: &UpdateAuthor) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(
            r#"
            UPDATE authors SET
                firstname = COALESCE($1, firstname),
                lastname = COALESCE($2, lastname),
                birth_date = COALESCE($3, birth_date),
                nationality = COALESCE($4, nationality),
                biography = COALESCE($5, biography),
                active = COALESCE($6, active)
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(author.firstname.as_deref())
        .bind(author.lastname.as_deref())
        .bind(author.birth_date)
        .bind(author.nationality.as_deref())
        .bind(author.biography.as_deref())
        .bind(author.active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// Soft delete: the row stays, flagged inactive
    pub async fn deactivate(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("UPDATE authors SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Author with id {} not found", id)));
        }
        Ok(())
    }
}
