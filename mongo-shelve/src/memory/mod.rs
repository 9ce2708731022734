//! In-process document collection for development and tests.
//!
//! [`InMemoryCollection`] implements [`DocumentCollectionProvider`] without a
//! server. It understands the parts of the MongoDB query language a shelve
//! and its callers rely on, and can enforce unique fields the way a unique
//! index would. Nothing is persisted.
//!
//! [`DocumentCollectionProvider`]: crate::collection::DocumentCollectionProvider

mod collection;
mod filter;
mod update;

pub use collection::*;

use crate::errors::{ErrorKind, ShelveError};
use thiserror::Error;

/// Failures raised by the in-memory collection itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryStoreError {
    /// A unique field already holds this value in another document
    #[error("E11000 duplicate key error collection: {namespace} index: {field} dup key: {value}")]
    DuplicateKey {
        namespace: String,
        field: String,
        value: String,
    },
    /// The filter or update uses an operator this collection does not evaluate
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),
    /// An operator was given an operand of the wrong shape
    #[error("Operator {operator} expects {expected}")]
    InvalidOperand {
        operator: String,
        expected: &'static str,
    },
    /// A unique constraint cannot be created over existing duplicates
    #[error("Cannot create unique constraint on {field}: duplicate value {value}")]
    ExistingDuplicates { field: String, value: String },
}

impl From<MemoryStoreError> for ShelveError {
    fn from(err: MemoryStoreError) -> Self {
        let kind = match err {
            MemoryStoreError::DuplicateKey { .. } | MemoryStoreError::ExistingDuplicates { .. } => {
                ErrorKind::UniqueConstraintViolation
            }
            MemoryStoreError::UnsupportedOperator(_) | MemoryStoreError::InvalidOperand { .. } => {
                ErrorKind::FilterError
            }
        };
        ShelveError::new_with_cause(&err.to_string(), kind, err)
    }
}
