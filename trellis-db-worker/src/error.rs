//! Error types for sort execution

use thiserror::Error;
use trellis_db_core::{ConversionError, ShardId};

/// Result type for sort operations
pub type Result<T> = std::result::Result<T, SortError>;

/// Sort execution errors
#[derive(Error, Debug)]
pub enum SortError {
    /// Error from trellis-db-core
    #[error("core error: {0}")]
    Core(#[from] trellis_db_core::Error),

    /// Malformed or unsupported request
    #[error("invalid sort request: {0}")]
    InvalidRequest(String),

    /// The primary attribute has no index, so the index strategy cannot run
    #[error("attribute {0} is not indexed")]
    NotIndexed(String),

    /// Indexed, but no tokenizer whose byte order matches value order
    #[error("{0}")]
    NotSortable(String),

    /// A request landed on a node that does not own the attribute's shard
    #[error("wrong shard: attribute {attr} belongs to shard {owner}")]
    WrongShard {
        /// Attribute being sorted
        attr: String,
        /// Shard that owns it
        owner: ShardId,
    },

    /// Secondary value could not be converted to its attribute type
    #[error("conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    /// The request scope was cancelled
    #[error("sort cancelled")]
    Cancelled,

    /// Remote dispatch failed on both the primary and the backup request
    #[error("remote sort failed: {0}")]
    Remote(String),

    /// Internal error (should not happen in normal operation)
    #[error("internal error: {0}")]
    Internal(String),
}

impl SortError {
    /// Not-sortable error for a non-string scalar.
    pub fn not_sortable(attr: &str) -> Self {
        SortError::NotSortable(format!("attribute {attr} is not sortable"))
    }

    /// Not-sortable error for a string attribute, which specifically needs
    /// an exact-style index.
    pub fn no_exact_index(attr: &str) -> Self {
        SortError::NotSortable(format!(
            "attribute {attr} does not have an exact index required for sorting"
        ))
    }
}
