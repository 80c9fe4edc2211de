//! Error types and result types for CRUD handlers and document store operations.
//!
//! Two channels exist and they never mix:
//!
//! - [`CrudError`] is returned synchronously, before a handler hands out a task.
//!   It covers misconfiguration and missing arguments.
//! - [`DocumentStoreError`] is the error of a running task. Every failure coming
//!   from a [`Model`](crate::model::Model) travels through this type.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::handler::Method;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// A document with the same ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document already exists {0} in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The supplied identifier cannot be cast to the store's identifier type.
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
    /// The document violates schema constraints or has invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The filter, projection or sort expression cannot be executed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// An unknown error occurred.
    #[error("Unknown error: {0}")]
    Unknown(String),
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

/// Errors raised synchronously by [`RestCrud`](crate::handler::RestCrud) before any store work starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrudError {
    /// The handler set was built or used with an incomplete configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A handler was invoked without its request or response argument.
    #[error("no {0} object specified")]
    MissingArgument(&'static str),
    /// The method is not exposed because no identifier parameter was configured.
    #[error("Method {0} is not available without an identifier parameter")]
    MethodNotAllowed(Method),
}

/// A specialized `Result` type for the synchronous part of a handler call.
pub type CrudResult<T> = Result<T, CrudError>;
