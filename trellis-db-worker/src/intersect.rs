//! Bucket intersection with per-row pagination windows.
//!
//! The indexed scanner feeds one bucket token at a time into
//! [`intersect_bucket`], which intersects the bucket's posting list with
//! every input row and accumulates results under each row's offset/count
//! window. The outcome tells the scanner whether more buckets are needed.

use crate::error::Result;
use crate::request::SortRequest;
use crate::values::sort_by_value;
use tokio_util::sync::CancellationToken;
use trellis_db_core::{index_key, AttrType, KvStore, UidList, Value};

/// Per-row accumulator state for the index walk.
#[derive(Debug, Default)]
pub(crate) struct IntersectedRow {
    /// Remaining pagination offset; decremented as buckets are skipped
    pub offset: i64,
    /// Accumulated uids, in index order of contribution
    pub uids: UidList,
    /// Values aligned to `uids`; only filled in multi-attribute mode
    pub vals: Vec<Value>,
}

impl IntersectedRow {
    pub(crate) fn new(offset: i64) -> Self {
        IntersectedRow {
            offset,
            ..Default::default()
        }
    }
}

/// What the scanner should do after a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BucketOutcome {
    /// More buckets are needed
    Continue,
    /// Every row has its pagination window filled
    Done,
}

/// Intersect one index bucket with every row of the request matrix.
///
/// In single-attribute mode rows stop accumulating once their window is
/// full and the outcome becomes [`BucketOutcome::Done`] when all rows are
/// full. In multi-attribute mode every bucket contributes to every row and
/// the outcome is always [`BucketOutcome::Continue`]: the extender may
/// reorder rows, so the walk must cover the whole key range and truncation
/// happens at the end.
pub(crate) async fn intersect_bucket(
    store: &dyn KvStore,
    cancel: &CancellationToken,
    req: &SortRequest,
    typ: AttrType,
    token: &[u8],
    out: &mut [IntersectedRow],
) -> Result<BucketOutcome> {
    let count = req.count;
    let multi = req.is_multi();
    let attr = &req.attrs[0];

    let key = index_key(attr, token);
    let pl = store.posting_list(&key).await;

    for (row, il) in req.uid_matrix.iter().zip(out.iter_mut()) {
        if !multi && count > 0 && il.uids.len() as i64 >= count {
            continue;
        }

        // Intersect the bucket with this row.
        let mut hits = pl.uids(row);
        let n = hits.len() as i64;

        if il.offset >= n {
            // The whole intersection falls before the window; no need to
            // sort it, just consume the offset.
            il.offset -= n;
            continue;
        }

        // Within the page: resolve intra-bucket order by value. The result
        // may shrink when uids lack a value in the requested language.
        let mut vals = sort_by_value(store, cancel, req, &mut hits, typ).await?;

        if il.offset > 0 {
            let skip = (il.offset as usize).min(hits.len());
            hits.drain(..skip);
            vals.drain(..skip);
            il.offset = 0;
        }

        // In multi-attribute mode the count is not applied here; the
        // extender truncates after the lexicographic re-sort.
        let mut take = hits.len();
        if !multi && count > 0 {
            let slack = (count as usize).saturating_sub(il.uids.len());
            take = take.min(slack);
        }

        il.uids.extend_from_slice(&hits[..take]);
        if multi {
            il.vals.extend(vals.into_iter().take(take));
        }
    }

    if multi || count == 0 {
        // Walk the whole key range.
        return Ok(BucketOutcome::Continue);
    }
    for il in out.iter() {
        if (il.uids.len() as i64) < count {
            return Ok(BucketOutcome::Continue);
        }
    }
    Ok(BucketOutcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_db_core::MemoryKv;

    const INT_TOK: u8 = 0x04;

    fn int_token(v: i64) -> Vec<u8> {
        let mut t = vec![INT_TOK];
        t.extend_from_slice(&((v as u64) ^ (1 << 63)).to_be_bytes());
        t
    }

    fn seed(store: &MemoryKv, attr: &str, data: &[(u64, i64)]) {
        for &(uid, v) in data {
            store.put_value(attr, uid, &Value::Int(v));
            store.put_index(attr, &int_token(v), uid);
        }
    }

    #[tokio::test]
    async fn test_single_bucket_fills_window() {
        let store = MemoryKv::new();
        seed(&store, "age", &[(1, 10), (2, 10), (3, 10)]);
        let req = SortRequest::single("age", false, vec![vec![1, 2, 3]], 0, 2);
        let cancel = CancellationToken::new();
        let mut out = vec![IntersectedRow::new(0)];

        let outcome = intersect_bucket(
            &store,
            &cancel,
            &req,
            AttrType::Int,
            &int_token(10),
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(outcome, BucketOutcome::Done);
        assert_eq!(out[0].uids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_offset_consumes_whole_bucket() {
        let store = MemoryKv::new();
        seed(&store, "age", &[(1, 10), (2, 10), (3, 20)]);
        let req = SortRequest::single("age", false, vec![vec![1, 2, 3]], 2, 1);
        let cancel = CancellationToken::new();
        let mut out = vec![IntersectedRow::new(req.offset)];

        // Bucket 10 has two hits; the offset swallows them both unsorted.
        let outcome = intersect_bucket(
            &store,
            &cancel,
            &req,
            AttrType::Int,
            &int_token(10),
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(outcome, BucketOutcome::Continue);
        assert_eq!(out[0].offset, 0);
        assert!(out[0].uids.is_empty());

        // Bucket 20 supplies the single requested uid.
        let outcome = intersect_bucket(
            &store,
            &cancel,
            &req,
            AttrType::Int,
            &int_token(20),
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(outcome, BucketOutcome::Done);
        assert_eq!(out[0].uids, vec![3]);
    }

    #[tokio::test]
    async fn test_partial_offset_within_bucket() {
        let store = MemoryKv::new();
        seed(&store, "age", &[(5, 10), (6, 10), (7, 10)]);
        let req = SortRequest::single("age", false, vec![vec![5, 6, 7]], 1, 0);
        let cancel = CancellationToken::new();
        let mut out = vec![IntersectedRow::new(1)];

        intersect_bucket(
            &store,
            &cancel,
            &req,
            AttrType::Int,
            &int_token(10),
            &mut out,
        )
        .await
        .unwrap();
        // First hit dropped by the offset, remainder kept (count 0 = all).
        assert_eq!(out[0].uids, vec![6, 7]);
    }

    #[tokio::test]
    async fn test_multi_attr_never_done_and_keeps_values() {
        let store = MemoryKv::new();
        seed(&store, "age", &[(1, 10), (2, 20)]);
        let mut req = SortRequest::single("age", false, vec![vec![1, 2]], 0, 1);
        req.attrs.push("name".to_string());
        req.desc.push(false);
        let cancel = CancellationToken::new();
        let mut out = vec![IntersectedRow::new(0)];

        for v in [10, 20] {
            let outcome = intersect_bucket(
                &store,
                &cancel,
                &req,
                AttrType::Int,
                &int_token(v),
                &mut out,
            )
            .await
            .unwrap();
            // Count is already satisfied after the first bucket, but the
            // walk must continue and keep accumulating.
            assert_eq!(outcome, BucketOutcome::Continue);
        }
        assert_eq!(out[0].uids, vec![1, 2]);
        assert_eq!(out[0].vals, vec![Value::Int(10), Value::Int(20)]);
    }

    #[tokio::test]
    async fn test_full_rows_are_skipped() {
        let store = MemoryKv::new();
        seed(&store, "age", &[(1, 10), (2, 20)]);
        let req = SortRequest::single("age", false, vec![vec![1, 2]], 0, 1);
        let cancel = CancellationToken::new();
        let mut out = vec![IntersectedRow::new(0)];

        let outcome = intersect_bucket(
            &store,
            &cancel,
            &req,
            AttrType::Int,
            &int_token(10),
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(outcome, BucketOutcome::Done);
        let outcome = intersect_bucket(
            &store,
            &cancel,
            &req,
            AttrType::Int,
            &int_token(20),
            &mut out,
        )
        .await
        .unwrap();
        // Row already full: bucket 20 must not extend it.
        assert_eq!(outcome, BucketOutcome::Done);
        assert_eq!(out[0].uids, vec![1]);
    }
}
