//! Index-driven sort strategy.
//!
//! Walks the primary attribute's sortable index in request direction and
//! intersects each bucket with every input row until the pagination windows
//! fill (single-attribute) or the key range ends (multi-attribute).
//!
//! An identifier with a data value but no index entry never appears in a
//! bucket and is therefore dropped by this strategy; the index is assumed to
//! cover every identifier that carries a value.

use crate::error::{Result, SortError};
use crate::intersect::{intersect_bucket, BucketOutcome, IntersectedRow};
use crate::request::SortRequest;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use trellis_db_core::{
    index_prefix, Catalog, IteratorOptions, KvStore, ParsedKey, UidMatrix, Value,
};

/// Output of the indexed strategy: rows in index order of contribution,
/// primary values alongside when the request is multi-attribute.
#[derive(Debug, Default)]
pub(crate) struct IndexedSort {
    pub uid_matrix: UidMatrix,
    pub vals: Vec<Vec<Value>>,
}

/// Sort by walking the index of the primary attribute.
///
/// Fails fast when the attribute is non-scalar, unindexed, or has no
/// sortable tokenizer. Polls cancellation at every bucket boundary.
pub(crate) async fn sort_with_index(
    catalog: &dyn Catalog,
    store: &dyn KvStore,
    cancel: &CancellationToken,
    req: &SortRequest,
) -> Result<IndexedSort> {
    let attr = &req.attrs[0];
    let typ = catalog.attr_type(attr)?;
    if !typ.is_scalar() {
        return Err(SortError::InvalidRequest(format!(
            "cannot sort attribute {attr} of type {typ}"
        )));
    }
    if !catalog.is_indexed(attr) {
        return Err(SortError::NotIndexed(attr.clone()));
    }

    // First sortable tokenizer wins. String attributes can carry several
    // tokenizers of which only the exact one is sortable; other scalars
    // have a single tokenizer, so none-sortable means not sortable at all.
    let tokenizer = catalog.tokenizers(attr).into_iter().find(|t| t.sortable);
    let Some(tokenizer) = tokenizer else {
        return Err(if typ == trellis_db_core::AttrType::Str {
            SortError::no_exact_index(attr)
        } else {
            SortError::not_sortable(attr)
        });
    };

    let desc = req.desc[0];
    let prefix = index_prefix(attr, tokenizer.id);
    let seek = if desc {
        // Land on the last key of this tokenizer's range.
        index_prefix(attr, tokenizer.id.wrapping_add(1))
    } else {
        prefix.clone()
    };

    let mut out: Vec<IntersectedRow> = req
        .uid_matrix
        .iter()
        .map(|_| IntersectedRow::new(req.offset))
        .collect();

    let mut it = store.iterator(IteratorOptions {
        reverse: desc,
        // Keys only; values resolve through posting lists.
        fetch_values: false,
    });
    it.seek(&seek).await;

    while it.valid() {
        let key = it.key();
        if !key.starts_with(&prefix) {
            break;
        }
        if cancel.is_cancelled() {
            return Err(SortError::Cancelled);
        }
        let key = key.to_vec();
        let parsed = ParsedKey::parse(&key)?;
        let token = parsed
            .token()
            .ok_or_else(|| SortError::Internal(format!("non-index key {key:?} under index prefix")))?;
        trace!(attr = %attr, token = ?token, "intersecting bucket");

        match intersect_bucket(store, cancel, req, typ, token, &mut out).await? {
            BucketOutcome::Done => break,
            BucketOutcome::Continue => {}
        }
        it.next().await;
    }

    if cancel.is_cancelled() {
        return Err(SortError::Cancelled);
    }

    let multi = req.is_multi();
    let mut result = IndexedSort::default();
    for il in out {
        result.uid_matrix.push(il.uids);
        if multi {
            result.vals.push(il.vals);
        }
    }
    Ok(result)
}
