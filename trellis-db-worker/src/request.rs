//! Wire types for sort and value-for-list requests.

use crate::error::{Result, SortError};
use serde::{Deserialize, Serialize};
use trellis_db_core::{UidList, UidMatrix, WireValue};

/// A sort request: order each matrix row by `attrs` and clip it to the
/// pagination window.
///
/// Invariants checked by [`SortRequest::validate`]:
/// - at least one attribute, and `attrs.len() == desc.len()`
/// - `offset >= 0` and `count >= 0` (a count of zero means "all")
///
/// The primary attribute must live on the shard that executes the request;
/// secondary attributes may live anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortRequest {
    /// Attributes to order by, primary first. A secondary attribute may be
    /// prefixed with `~` to traverse the reverse edge.
    pub attrs: Vec<String>,
    /// Per-attribute descending flags, parallel to `attrs`
    pub desc: Vec<bool>,
    /// Rows to sort; each row is an independent pagination unit
    pub uid_matrix: UidMatrix,
    /// Number of leading results to skip per row
    #[serde(default)]
    pub offset: i64,
    /// Maximum results per row; zero means no limit
    #[serde(default)]
    pub count: i64,
    /// Language preference for tagged values, most preferred first
    #[serde(default)]
    pub langs: Vec<String>,
}

impl SortRequest {
    /// Single-attribute request with no language preference.
    pub fn single(
        attr: impl Into<String>,
        desc: bool,
        uid_matrix: UidMatrix,
        offset: i64,
        count: i64,
    ) -> Self {
        SortRequest {
            attrs: vec![attr.into()],
            desc: vec![desc],
            uid_matrix,
            offset,
            count,
            langs: Vec::new(),
        }
    }

    /// Whether this request sorts by more than one attribute.
    pub fn is_multi(&self) -> bool {
        self.attrs.len() > 1
    }

    /// Check the request invariants.
    pub fn validate(&self) -> Result<()> {
        if self.attrs.is_empty() {
            return Err(SortError::InvalidRequest(
                "at least one sort attribute is required".to_string(),
            ));
        }
        if self.attrs.len() != self.desc.len() {
            return Err(SortError::InvalidRequest(format!(
                "{} attributes but {} direction flags",
                self.attrs.len(),
                self.desc.len()
            )));
        }
        if self.count < 0 {
            return Err(SortError::InvalidRequest(format!(
                "negative or infinite count is not supported with sorting: {} {}; \
                 try flipping the order and returning the first few elements instead",
                self.attrs[0], self.count
            )));
        }
        if self.offset < 0 {
            return Err(SortError::InvalidRequest(format!(
                "negative offset is not supported with sorting: {} {}",
                self.attrs[0], self.offset
            )));
        }
        Ok(())
    }
}

/// A sorted matrix, same row count and row order as the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortResult {
    /// Per-row sorted uid prefixes
    pub uid_matrix: UidMatrix,
}

/// Fetch the value of one attribute for a list of uids.
///
/// The reply is a [`ValueMatrix`] aligned to `uids`; positions without a
/// posting carry the nil sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuesRequest {
    /// Attribute to read, already stripped of any `~` prefix
    pub attr: String,
    /// Traverse the reverse edge instead of the forward one
    #[serde(default)]
    pub reverse: bool,
    /// Uids to resolve, ascending
    pub uids: UidList,
    /// Language preference, most preferred first
    #[serde(default)]
    pub langs: Vec<String>,
}

/// Values aligned one-to-one with the uid list of a [`ValuesRequest`].
pub type ValueMatrix = Vec<WireValue>;
