//! SQLite storage bootstrap for the relational persistence backend.
//!
//! # Responsibility
//! - Open and configure SQLite connections used by relational repositories.
//! - Define the storage-level error shared by backends.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - Schema/DDL is owned by the caller, never applied here.

use thiserror::Error;

mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Storage transport or statement failure.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid SQL identifier `{0}`")]
    InvalidIdentifier(String),
}
