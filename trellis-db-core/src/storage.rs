//! Storage traits for the key-value layer.
//!
//! The engine reads the store through three seams:
//!
//! - [`KvStore`]: open iterators and resolve posting lists by key
//! - [`KvIterator`]: ordered key walk (`seek`/`valid`/`key`/`next`)
//! - [`PostingList`]: per-key uid set and value accessor
//!
//! The traits are object-safe and use `async_trait`; iterator advancement and
//! posting-list resolution are suspension points, everything on materialized
//! data is synchronous. [`MemoryKv`] is the in-memory implementation used by
//! tests and embedded deployments.

use crate::error::{Error, Result};
use crate::ids::{Uid, UidList};
use crate::value::WireValue;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Options for opening a key iterator.
///
/// Sort scans always run with `fetch_values: false`: the engine resolves
/// values through posting lists, never through the iterator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IteratorOptions {
    /// Walk keys in descending byte order
    pub reverse: bool,
    /// Prefetch values alongside keys
    pub fetch_values: bool,
}

/// Ordered walk over store keys.
///
/// With `reverse` set, `seek` positions at the largest key not greater than
/// the target and `next` moves backward; otherwise `seek` positions at the
/// smallest key not less than the target and `next` moves forward.
#[async_trait]
pub trait KvIterator: Send {
    /// Position at the first key relative to `key` per the direction rules.
    async fn seek(&mut self, key: &[u8]);

    /// Whether the iterator currently points at a key.
    fn valid(&self) -> bool;

    /// The current key. Empty when not valid.
    fn key(&self) -> &[u8];

    /// Advance one key in walk direction.
    async fn next(&mut self);
}

/// Per-key posting list: the uids associated with one data or index key.
pub trait PostingList: Send + Sync {
    /// Uids in the list intersected with `intersect`, in list (ascending)
    /// order. An empty `intersect` returns the whole list.
    fn uids(&self, intersect: &[Uid]) -> UidList;

    /// The value stored under this key.
    ///
    /// Language tags are tried in `langs` order, then the untagged value.
    /// Errors with `NotFound` when no variant matches.
    fn value_for(&self, langs: &[String]) -> Result<WireValue>;
}

/// Key-value store seam.
#[async_trait]
pub trait KvStore: fmt::Debug + Send + Sync {
    /// Open an iterator over all keys.
    fn iterator(&self, opts: IteratorOptions) -> Box<dyn KvIterator + '_>;

    /// Resolve the posting list at `key`. A missing key yields the empty
    /// posting list, never an error.
    async fn posting_list(&self, key: &[u8]) -> Arc<dyn PostingList>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// One posting: sorted uids plus optional values by language tag.
#[derive(Debug, Clone, Default)]
struct MemoryPosting {
    uids: UidList,
    untagged: Option<WireValue>,
    tagged: BTreeMap<String, WireValue>,
}

impl PostingList for MemoryPosting {
    fn uids(&self, intersect: &[Uid]) -> UidList {
        if intersect.is_empty() {
            return self.uids.clone();
        }
        let wanted: HashSet<Uid> = intersect.iter().copied().collect();
        self.uids
            .iter()
            .copied()
            .filter(|uid| wanted.contains(uid))
            .collect()
    }

    fn value_for(&self, langs: &[String]) -> Result<WireValue> {
        for lang in langs {
            if let Some(v) = self.tagged.get(lang) {
                return Ok(v.clone());
            }
        }
        self.untagged
            .clone()
            .ok_or_else(|| Error::not_found("no value for requested languages"))
    }
}

/// In-memory key-value store backed by a `BTreeMap`.
///
/// Iterators snapshot the key set at open time, so a scan is unaffected by
/// concurrent writes.
#[derive(Debug, Default)]
pub struct MemoryKv {
    inner: RwLock<BTreeMap<Vec<u8>, MemoryPosting>>,
}

impl MemoryKv {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an untagged value posting for `(attr, uid)`.
    pub fn put_value(&self, attr: &str, uid: Uid, value: &crate::value::Value) {
        let key = crate::keys::data_key(attr, uid);
        let mut inner = self.inner.write().expect("store lock poisoned");
        let posting = inner.entry(key).or_default();
        posting.untagged = Some(value.to_wire());
        if !posting.uids.contains(&uid) {
            posting.uids.push(uid);
            posting.uids.sort_unstable();
        }
    }

    /// Store a language-tagged value posting for `(attr, uid)`.
    pub fn put_lang_value(&self, attr: &str, uid: Uid, lang: &str, value: &crate::value::Value) {
        let key = crate::keys::data_key(attr, uid);
        let mut inner = self.inner.write().expect("store lock poisoned");
        let posting = inner.entry(key).or_default();
        posting.tagged.insert(lang.to_string(), value.to_wire());
        if !posting.uids.contains(&uid) {
            posting.uids.push(uid);
            posting.uids.sort_unstable();
        }
    }

    /// Add `uid` to the index bucket for `token` under `attr`.
    pub fn put_index(&self, attr: &str, token: &[u8], uid: Uid) {
        let key = crate::keys::index_key(attr, token);
        let mut inner = self.inner.write().expect("store lock poisoned");
        let posting = inner.entry(key).or_default();
        if !posting.uids.contains(&uid) {
            posting.uids.push(uid);
            posting.uids.sort_unstable();
        }
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    fn iterator(&self, opts: IteratorOptions) -> Box<dyn KvIterator + '_> {
        let keys: Vec<Vec<u8>> = self
            .inner
            .read()
            .expect("store lock poisoned")
            .keys()
            .cloned()
            .collect();
        Box::new(MemoryKvIterator {
            keys,
            pos: -1,
            reverse: opts.reverse,
        })
    }

    async fn posting_list(&self, key: &[u8]) -> Arc<dyn PostingList> {
        let inner = self.inner.read().expect("store lock poisoned");
        match inner.get(key) {
            Some(p) => Arc::new(p.clone()),
            None => Arc::new(MemoryPosting::default()),
        }
    }
}

/// Snapshot iterator over a sorted key vector.
struct MemoryKvIterator {
    keys: Vec<Vec<u8>>,
    pos: isize,
    reverse: bool,
}

#[async_trait]
impl KvIterator for MemoryKvIterator {
    async fn seek(&mut self, key: &[u8]) {
        self.pos = if self.reverse {
            // Largest key <= target.
            self.keys.partition_point(|k| k.as_slice() <= key) as isize - 1
        } else {
            // Smallest key >= target.
            self.keys.partition_point(|k| k.as_slice() < key) as isize
        };
    }

    fn valid(&self) -> bool {
        self.pos >= 0 && (self.pos as usize) < self.keys.len()
    }

    fn key(&self) -> &[u8] {
        if self.valid() {
            &self.keys[self.pos as usize]
        } else {
            &[]
        }
    }

    async fn next(&mut self) {
        if self.reverse {
            self.pos -= 1;
        } else {
            self.pos += 1;
        }
    }
}
