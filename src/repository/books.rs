//! Books repository for database operations

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        author::AuthorShort,
        book::{Book, BookDetails, BookQuery, BookStatus, CategoryShort, CreateBook, UpdateBook},
    },
    policy,
};

use super::{like_pattern, map_write_error, order_clause};

const DETAILS_SELECT: &str = r#"
    SELECT b.id, b.title, b.isbn, b.publication_date, b.page_count, b.description,
           b.status, b.price, b.created_at,
           b.author_id, a.firstname || ' ' || a.lastname AS author_name,
           b.category_id, c.name AS category_name
    FROM books b
    JOIN authors a ON a.id = b.author_id
    LEFT JOIN categories c ON c.id = b.category_id
"#;

const ORDERINGS: &[(&str, &str)] = &[
    ("title", "b.title"),
    ("publication_date", "b.publication_date"),
    ("price", "b.price"),
    ("created_at", "b.created_at"),
];

const DUPLICATE_ISBN: &str = "A book with this ISBN already exists";

/// Internal row structure for book detail queries
#[derive(Debug, FromRow)]
struct BookDetailsRow {
    id: i32,
    title: String,
    isbn: String,
    publication_date: NaiveDate,
    page_count: i32,
    description: String,
    status: BookStatus,
    price: Decimal,
    created_at: DateTime<Utc>,
    author_id: i32,
    author_name: String,
    category_id: Option<i32>,
    category_name: Option<String>,
}

impl From<BookDetailsRow> for BookDetails {
    fn from(row: BookDetailsRow) -> Self {
        let category = match (row.category_id, row.category_name) {
            (Some(id), Some(name)) => Some(CategoryShort { id, name }),
            _ => None,
        };

        BookDetails {
            id: row.id,
            title: row.title,
            isbn: row.isbn,
            publication_date: row.publication_date,
            page_count: row.page_count,
            description: row.description,
            status_label: row.status.label().to_string(),
            status: row.status,
            price: row.price,
            created_at: row.created_at,
            author: AuthorShort {
                id: row.author_id,
                full_name: row.author_name,
            },
            category,
        }
    }
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_details(&self, id: i32) -> AppResult<BookDetails> {
        let query = format!("{} WHERE b.id = $1", DETAILS_SELECT);
        sqlx::query_as::<_, BookDetailsRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(BookDetails::from)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    pub async fn list(&self, filter: &BookQuery) -> AppResult<Vec<BookDetails>> {
        let query = format!(
            r#"{}
            WHERE ($1::text IS NULL OR b.status = $1)
              AND ($2::int IS NULL OR b.author_id = $2)
              AND ($3::int IS NULL OR b.category_id = $3)
              AND ($4::text IS NULL OR b.title ILIKE $5 OR b.isbn = $4)
            ORDER BY {}
            "#,
            DETAILS_SELECT,
            order_clause(filter.ordering.as_deref(), ORDERINGS, "b.title"),
        );

        let search = filter.search.as_deref();
        let rows = sqlx::query_as::<_, BookDetailsRow>(&query)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.author_id)
            .bind(filter.category_id)
            .bind(search)
            .bind(search.map(like_pattern))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(BookDetails::from).collect())
    }

    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let status = book.status.unwrap_or_default();

        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, isbn, publication_date, page_count, description,
                               author_id, category_id, status, price)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(book.publication_date)
        .bind(book.page_count)
        .bind(&book.description)
        .bind(book.author_id)
        .bind(book.category_id)
        .bind(status.as_str())
        .bind(book.price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, DUPLICATE_ISBN))
    }

    /// Update the fields present in `book`.
    ///
    /// The row is locked while the requested status change is checked, so a
    /// concurrent loan cannot slip between the check and the write.
    pub async fn update(&self, id: i32, book: &UpdateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let current: BookStatus = sqlx::query_scalar("SELECT status FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        policy::check_manual_status(current, book.status)?;

        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($1, title),
                isbn = COALESCE($2, isbn),
                publication_date = COALESCE($3, publication_date),
                page_count = COALESCE($4, page_count),
                description = COALESCE($5, description),
                author_id = COALESCE($6, author_id),
                category_id = CASE WHEN $7 THEN $8 ELSE category_id END,
                price = COALESCE($9, price),
                status = COALESCE($10, status)
            WHERE id = $11
            RETURNING *
            "#,
        )
        .bind(book.title.as_deref())
        .bind(book.isbn.as_deref())
        .bind(book.publication_date)
        .bind(book.page_count)
        .bind(book.description.as_deref())
        .bind(book.author_id)
        .bind(book.category_id.is_some())
        .bind(book.category_id.flatten())
        .bind(book.price)
        .bind(book.status.map(|s| s.as_str()))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, DUPLICATE_ISBN))?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Hard delete; loans of the book are removed with it
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}
