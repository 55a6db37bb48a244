//! Error types for trellis-db-core

use crate::convert::ConversionError;
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Attribute is not defined in the catalog
    #[error("attribute {0} is not defined in the schema")]
    UndefinedAttr(String),

    /// Key bytes did not parse as a data or index key
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// Resource not found (posting, language variant, ...)
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage-related errors
    #[error("storage error: {0}")]
    Storage(String),

    /// Value conversion failure
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl Error {
    /// Create an undefined-attribute error
    pub fn undefined_attr(attr: impl Into<String>) -> Self {
        Error::UndefinedAttr(attr.into())
    }

    /// Create a malformed-key error
    pub fn malformed_key(msg: impl Into<String>) -> Self {
        Error::MalformedKey(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }
}
