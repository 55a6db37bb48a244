//! Direct sort strategy.
//!
//! Sorts each row by fetching values and sorting in memory, then paginates.
//! Cheaper than an index walk when rows are small or the index range dwarfs
//! the requested window. Authoritative only for single-attribute requests.

use crate::error::{Result, SortError};
use crate::request::{SortRequest, SortResult};
use crate::values::sort_by_value;
use tokio_util::sync::CancellationToken;
use trellis_db_core::{page_range, Catalog, KvStore};

/// Sort every row directly by value fetch, in-memory sort, and pagination.
///
/// Polls cancellation at every row boundary. Rows are copied before sorting
/// so the caller's matrix is never mutated.
pub(crate) async fn sort_without_index(
    catalog: &dyn Catalog,
    store: &dyn KvStore,
    cancel: &CancellationToken,
    req: &SortRequest,
) -> Result<SortResult> {
    let attr = &req.attrs[0];
    let typ = catalog.attr_type(attr)?;
    if !typ.is_scalar() {
        return Err(SortError::InvalidRequest(format!(
            "cannot sort attribute {attr} of type {typ}"
        )));
    }

    let mut result = SortResult::default();
    for row in &req.uid_matrix {
        if cancel.is_cancelled() {
            return Err(SortError::Cancelled);
        }
        // Copy: the caller's row feeds the next query level.
        let mut uids = row.clone();
        sort_by_value(store, cancel, req, &mut uids, typ).await?;
        let (start, end) = page_range(req.count, req.offset, uids.len());
        result.uid_matrix.push(uids[start..end].to_vec());
    }
    Ok(result)
}
