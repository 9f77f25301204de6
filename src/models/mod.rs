//! Data models for Biblioteca

pub mod author;
pub mod book;
pub mod category;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use author::{Author, AuthorDetails};
pub use book::{Book, BookDetails, BookStatus};
pub use category::{Category, CategoryDetails};
pub use loan::{Loan, LoanDetails, LoanStats};
pub use user::{Principal, User, UserClaims};
