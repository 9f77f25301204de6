//! Catalog management service (authors, categories, books)

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorDetails, AuthorQuery, CreateAuthor, UpdateAuthor},
        book::{Book, BookDetails, BookQuery, BookStatus, CreateBook, UpdateBook},
        category::{Category, CategoryDetails, CreateCategory, UpdateCategory},
    },
    policy,
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    // =========================================================================
    // AUTHORS
    // =========================================================================

    pub async fn list_authors(&self, query: &AuthorQuery) -> AppResult<Vec<AuthorDetails>> {
        self.repository.authors.list(query).await
    }

    /// Get an active author; deleted authors are reported as missing
    pub async fn get_author(&self, id: i32) -> AppResult<AuthorDetails> {
        self.repository.authors.get_details(id).await
    }

    pub async fn create_author(&self, author: CreateAuthor) -> AppResult<Author> {
        let created = self.repository.authors.create(&author).await?;
        tracing::info!("Catalog: created author id={}", created.id);
        Ok(created)
    }

    pub async fn update_author(&self, id: i32, author: UpdateAuthor) -> AppResult<Author> {
        self.repository.authors.update(id, &author).await
    }

    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        self.repository.authors.deactivate(id).await?;
        tracing::info!("Catalog: deactivated author id={}", id);
        Ok(())
    }

    // =========================================================================
    // CATEGORIES
    // =========================================================================

    pub async fn list_categories(&self) -> AppResult<Vec<CategoryDetails>> {
        self.repository.categories.list().await
    }

    pub async fn get_category(&self, id: i32) -> AppResult<CategoryDetails> {
        self.repository.categories.get_details(id).await
    }

    pub async fn create_category(&self, category: CreateCategory) -> AppResult<Category> {
        self.repository.categories.create(&category).await
    }

    pub async fn update_category(&self, id: i32, category: UpdateCategory) -> AppResult<Category> {
        self.repository.categories.update(id, &category).await
    }

    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        self.repository.categories.delete(id).await
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    pub async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<BookDetails>> {
        self.repository.books.list(query).await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<BookDetails> {
        self.repository.books.get_details(id).await
    }

    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        policy::check_manual_status(BookStatus::Available, book.status)?;
        self.ensure_active_author(book.author_id).await?;
        if let Some(category_id) = book.category_id {
            self.ensure_category(category_id).await?;
        }

        let created = self.repository.books.create(&book).await?;
        tracing::info!("Catalog: created book id={} isbn={}", created.id, created.isbn);
        Ok(created)
    }

    pub async fn update_book(&self, id: i32, book: UpdateBook) -> AppResult<Book> {
        if let Some(author_id) = book.author_id {
            self.ensure_active_author(author_id).await?;
        }
        if let Some(Some(category_id)) = book.category_id {
            self.ensure_category(category_id).await?;
        }

        self.repository.books.update(id, &book).await
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!("Catalog: deleted book id={}", id);
        Ok(())
    }

    /// Books may only reference authors that exist and are active
    async fn ensure_active_author(&self, author_id: i32) -> AppResult<()> {
        let author = match self.repository.authors.get_by_id(author_id).await {
            Ok(author) => author,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::Validation(format!("Author {} does not exist", author_id)))
            }
            Err(e) => return Err(e),
        };

        if !author.active {
            return Err(AppError::Validation(format!("Author {} is not active", author_id)));
        }
        Ok(())
    }

    async fn ensure_category(&self, category_id: i32) -> AppResult<()> {
        if !self.repository.categories.exists(category_id).await? {
            return Err(AppError::Validation(format!(
                "Category {} does not exist",
                category_id
            )));
        }
        Ok(())
    }
}
