//! Value fetch and row sorting.
//!
//! The row sorter materializes the primary-attribute value for every uid in
//! a row, drops uids whose value is missing, and sorts the survivors stably
//! under the type's total order. It backs both scan strategies: the
//! non-indexed scanner calls it per row, the bucket intersector calls it per
//! bucket to resolve intra-bucket order.

use crate::error::{Result, SortError};
use crate::request::SortRequest;
use std::cmp::Ordering;
use tokio_util::sync::CancellationToken;
use trellis_db_core::{cmp_values, convert, data_key, AttrType, KvStore, Uid, UidList, Value};

/// Read the typed value of `attr` for one uid.
///
/// Resolves the posting at the data key, picks the best language variant,
/// and converts to the schema type. Every failure mode means "no value".
pub(crate) async fn fetch_value(
    store: &dyn KvStore,
    uid: Uid,
    attr: &str,
    langs: &[String],
    typ: AttrType,
) -> Result<Value> {
    let pl = store.posting_list(&data_key(attr, uid)).await;
    let wire = pl.value_for(langs)?;
    Ok(convert(&wire, typ)?)
}

/// Sort one uid row by the primary attribute's value.
///
/// `uids` is replaced with the surviving uids in sort order; the returned
/// values are aligned to it. Uids without a fetchable value are dropped.
/// Ties keep their input order.
pub(crate) async fn sort_by_value(
    store: &dyn KvStore,
    cancel: &CancellationToken,
    req: &SortRequest,
    uids: &mut UidList,
    typ: AttrType,
) -> Result<Vec<Value>> {
    let attr = &req.attrs[0];
    let mut pairs: Vec<(Uid, Value)> = Vec::with_capacity(uids.len());
    for &uid in uids.iter() {
        if cancel.is_cancelled() {
            return Err(SortError::Cancelled);
        }
        match fetch_value(store, uid, attr, &req.langs, typ).await {
            Ok(v) if !v.is_nil() => pairs.push((uid, v)),
            // Missing value: skip that uid in the result.
            Ok(_) | Err(_) => continue,
        }
    }
    let desc = req.desc[0];
    pairs.sort_by(|(_, a), (_, b)| {
        let ord = cmp_values(a, b);
        if desc {
            ord.reverse()
        } else {
            ord
        }
    });
    *uids = pairs.iter().map(|(uid, _)| *uid).collect();
    Ok(pairs.into_iter().map(|(_, v)| v).collect())
}

/// Lexicographic comparison of two value rows under per-column directions.
pub(crate) fn cmp_lex(a: &[Value], b: &[Value], desc: &[bool]) -> Ordering {
    for (k, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let ord = cmp_values(x, y);
        if ord != Ordering::Equal {
            return if desc.get(k).copied().unwrap_or(false) {
                ord.reverse()
            } else {
                ord
            };
        }
    }
    Ordering::Equal
}

/// Stable lexicographic sort of a uid row and its per-uid value rows.
pub(crate) fn sort_uids_lex(uids: &mut UidList, vals: &mut Vec<Vec<Value>>, desc: &[bool]) {
    debug_assert_eq!(uids.len(), vals.len());
    let mut rows: Vec<(Vec<Value>, Uid)> =
        std::mem::take(vals).into_iter().zip(uids.drain(..)).collect();
    rows.sort_by(|(a, _), (b, _)| cmp_lex(a, b, desc));
    for (v, uid) in rows {
        vals.push(v);
        uids.push(uid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_db_core::MemoryKv;

    fn req(attr: &str, desc: bool) -> SortRequest {
        SortRequest::single(attr, desc, vec![], 0, 0)
    }

    #[tokio::test]
    async fn test_sort_by_value_ascending() {
        let store = MemoryKv::new();
        for (uid, v) in [(1, 30), (2, 10), (3, 20)] {
            store.put_value("age", uid, &Value::Int(v));
        }
        let cancel = CancellationToken::new();
        let mut uids = vec![1, 2, 3];
        let vals = sort_by_value(&store, &cancel, &req("age", false), &mut uids, AttrType::Int)
            .await
            .unwrap();
        assert_eq!(uids, vec![2, 3, 1]);
        assert_eq!(vals, vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
    }

    #[tokio::test]
    async fn test_sort_by_value_descending() {
        let store = MemoryKv::new();
        for (uid, v) in [(1, 30), (2, 10), (3, 20)] {
            store.put_value("age", uid, &Value::Int(v));
        }
        let cancel = CancellationToken::new();
        let mut uids = vec![1, 2, 3];
        sort_by_value(&store, &cancel, &req("age", true), &mut uids, AttrType::Int)
            .await
            .unwrap();
        assert_eq!(uids, vec![1, 3, 2]);
    }

    #[tokio::test]
    async fn test_missing_values_are_dropped() {
        let store = MemoryKv::new();
        store.put_value("age", 1, &Value::Int(10));
        store.put_value("age", 3, &Value::Int(20));
        let cancel = CancellationToken::new();
        let mut uids = vec![1, 2, 3];
        let vals = sort_by_value(&store, &cancel, &req("age", false), &mut uids, AttrType::Int)
            .await
            .unwrap();
        assert_eq!(uids, vec![1, 3]);
        assert_eq!(vals.len(), 2);
    }

    #[tokio::test]
    async fn test_ties_keep_input_order() {
        let store = MemoryKv::new();
        for uid in [4, 2, 9] {
            store.put_value("age", uid, &Value::Int(7));
        }
        let cancel = CancellationToken::new();
        let mut uids = vec![4, 2, 9];
        sort_by_value(&store, &cancel, &req("age", false), &mut uids, AttrType::Int)
            .await
            .unwrap();
        assert_eq!(uids, vec![4, 2, 9]);
    }

    #[tokio::test]
    async fn test_cancelled_row_sort() {
        let store = MemoryKv::new();
        store.put_value("age", 1, &Value::Int(10));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut uids = vec![1];
        let err = sort_by_value(&store, &cancel, &req("age", false), &mut uids, AttrType::Int)
            .await
            .unwrap_err();
        assert!(matches!(err, SortError::Cancelled));
    }

    #[test]
    fn test_cmp_lex_directions() {
        let a = vec![Value::Str("A".into()), Value::Str("Al".into())];
        let b = vec![Value::Str("A".into()), Value::Str("Bo".into())];
        let c = vec![Value::Str("B".into()), Value::Str("Zoe".into())];
        // grade descending, name ascending
        let desc = [true, false];
        assert_eq!(cmp_lex(&c, &a, &desc), Ordering::Less);
        assert_eq!(cmp_lex(&a, &b, &desc), Ordering::Less);
        assert_eq!(cmp_lex(&a, &a, &desc), Ordering::Equal);
    }

    #[test]
    fn test_cmp_lex_nil_greater() {
        let present = vec![Value::Int(1), Value::Int(5)];
        let nil = vec![Value::Int(1), Value::Nil(AttrType::Int)];
        assert_eq!(cmp_lex(&present, &nil, &[false, false]), Ordering::Less);
        // Descending flips it: nil still exists, but sorts first.
        assert_eq!(cmp_lex(&present, &nil, &[false, true]), Ordering::Greater);
    }

    #[test]
    fn test_sort_uids_lex_stable() {
        let mut uids = vec![10, 20, 30];
        let mut vals = vec![
            vec![Value::Int(1)],
            vec![Value::Int(1)],
            vec![Value::Int(0)],
        ];
        sort_uids_lex(&mut uids, &mut vals, &[false]);
        assert_eq!(uids, vec![30, 10, 20]);
        assert_eq!(vals[0], vec![Value::Int(0)]);
    }
}
