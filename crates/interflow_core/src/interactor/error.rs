//! Errors raised by an interactor instead of being returned as a response.
//!
//! Business failures never appear here: they travel as
//! [`crate::Response`] failures. Variants below mean the pipeline was declared
//! wrongly or a backend could not open or close a transaction.

use crate::db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InteractorError {
    #[error("exposed attributes must be declared before calling `{0}`")]
    MissingExposedAttributes(String),
    #[error("invalid repository `{name}`: {reason}")]
    InvalidRepository { name: String, reason: String },
    #[error("steps must set the following exposed attributes: {}", .0.join(", "))]
    UnsetExposedAttributes(Vec<String>),
    #[error("transaction failure on backend `{kind}`: {source}")]
    Transaction {
        kind: &'static str,
        #[source]
        source: DbError,
    },
}
