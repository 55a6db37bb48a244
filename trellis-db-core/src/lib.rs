//! # Trellis DB Core
//!
//! Core library for the trellis sharded graph store.
//!
//! This crate provides:
//! - Id aliases: `Uid`, `ShardId`, `UidList`, `UidMatrix`
//! - `AttrType` / `Value` scalar values with a strict total order
//! - `WireValue` binary value form and type conversion
//! - The data/index key codec
//! - Catalog and storage trait interfaces with in-memory implementations
//! - The pagination window helper
//!
//! ## Design Principles
//!
//! 1. **Injected collaborators**: the catalog and key-value store are traits;
//!    engines receive them rather than reaching for process globals.
//! 2. **Async at the I/O seam only**: posting-list lookup and iterator
//!    advancement are async; everything on materialized data is synchronous.
//! 3. **Strict total ordering**: every scalar pair compares; nil sorts after
//!    all present values.

pub mod catalog;
pub mod convert;
pub mod error;
pub mod ids;
pub mod keys;
pub mod page;
pub mod storage;
pub mod value;

pub use catalog::{AttrSchema, Catalog, MemoryCatalog, Tokenizer};
pub use convert::{convert, decode, ConversionError};
pub use error::{Error, Result};
pub use ids::{ShardId, Uid, UidList, UidMatrix};
pub use keys::{data_key, index_key, index_prefix, ParsedKey};
pub use page::page_range;
pub use storage::{IteratorOptions, KvIterator, KvStore, MemoryKv, PostingList};
pub use value::{cmp_values, AttrType, Value, WireValue, NIL_SENTINEL};
