//! Error types and result types for document store operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`]. The variants of
//! [`DocumentStoreError`] that describe expected outcomes (`NotFound`, `Duplicate`, `NoMatch`,
//! `NoModification`) carry the collection and the rendered filter so callers can branch on them
//! and still log something useful.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::{registry::RegistryError, wrapper::WrapperError};

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// No stored document matched the filter.
    ///
    /// This is an expected condition and drives find-or-create and cache-miss handling.
    #[error("No document in collection {collection} matches {filter}")]
    NotFound {
        collection: String,
        filter: String,
    },
    /// A unique index (or the `_id` field) rejected the write.
    #[error("Duplicate document in collection {collection}: {detail}")]
    Duplicate {
        collection: String,
        detail: String,
    },
    /// The collection validator rejected the document.
    #[error("Document rejected by validator of collection {collection}: {detail}")]
    Validation {
        collection: String,
        detail: String,
    },
    /// An update or replace filter matched nothing.
    #[error("No document in collection {collection} matched {filter}")]
    NoMatch {
        collection: String,
        filter: String,
    },
    /// An update or replace matched a document but left it unchanged.
    #[error("Document in collection {collection} matching {filter} was not modified")]
    NoModification {
        collection: String,
        filter: String,
    },
    /// A stored document could not be decoded into the requested type.
    #[error("Failed to decode document from collection {collection}: {detail}")]
    Decode {
        collection: String,
        detail: String,
    },
    /// Encoding or decoding of a polymorphic field failed.
    #[error(transparent)]
    Wrapper(#[from] WrapperError),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A field held a value of the wrong BSON type.
    #[error("Field {field} is not {expected}")]
    UnexpectedType {
        field: String,
        expected: &'static str,
    },
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl DocumentStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentStoreError::NotFound { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, DocumentStoreError::Duplicate { .. })
    }

    pub fn is_validation_failure(&self) -> bool {
        matches!(self, DocumentStoreError::Validation { .. })
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<RegistryError> for DocumentStoreError {
    fn from(err: RegistryError) -> Self {
        DocumentStoreError::Wrapper(err.into())
    }
}
