//! Read-only schema catalog.
//!
//! The sort engine consumes the schema through the [`Catalog`] trait: the
//! type of an attribute, whether it is list-valued, whether it is indexed,
//! and which tokenizers back that index. Parsing and mutation of the schema
//! live elsewhere.

use crate::error::{Error, Result};
use crate::value::AttrType;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Tokenizer capability record.
///
/// A tokenizer is *sortable* when the byte order of its tokens matches the
/// value order of its type (fixed-width big-endian for numbers, the exact
/// form for strings). Only sortable tokenizers can drive an index walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenizer {
    /// Identifier byte; the first byte of every token this tokenizer emits
    pub id: u8,
    /// Registry name
    pub name: &'static str,
    /// Whether token byte order matches value order
    pub sortable: bool,
}

impl Tokenizer {
    /// Term tokenizer for strings; one token per term, not sortable.
    pub fn term() -> Self {
        Tokenizer { id: 0x01, name: "term", sortable: false }
    }

    /// Exact-string tokenizer; sortable.
    pub fn exact() -> Self {
        Tokenizer { id: 0x02, name: "exact", sortable: true }
    }

    /// Geo cell tokenizer; not sortable.
    pub fn geo() -> Self {
        Tokenizer { id: 0x03, name: "geo", sortable: false }
    }

    /// Fixed-width big-endian integer tokenizer; sortable.
    pub fn int() -> Self {
        Tokenizer { id: 0x04, name: "int", sortable: true }
    }

    /// Order-preserving float tokenizer; sortable.
    pub fn float() -> Self {
        Tokenizer { id: 0x05, name: "float", sortable: true }
    }

    /// Boolean tokenizer; sortable.
    pub fn bool() -> Self {
        Tokenizer { id: 0x06, name: "bool", sortable: true }
    }

    /// Instant tokenizer; sortable.
    pub fn datetime() -> Self {
        Tokenizer { id: 0x07, name: "datetime", sortable: true }
    }

    /// Full-text tokenizer; not sortable.
    pub fn fulltext() -> Self {
        Tokenizer { id: 0x08, name: "fulltext", sortable: false }
    }
}

/// Schema entry for one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSchema {
    /// Declared type
    pub ty: AttrType,
    /// Whether the attribute holds a list of values
    pub list: bool,
    /// Whether the attribute has an index
    pub indexed: bool,
    /// Tokenizers backing the index, in declaration order
    pub tokenizers: Vec<Tokenizer>,
    /// Whether a reverse index is maintained
    pub reverse: bool,
    /// Whether a count index is maintained
    pub count: bool,
}

impl AttrSchema {
    /// A bare attribute of the given type: no index, no list.
    pub fn new(ty: AttrType) -> Self {
        AttrSchema {
            ty,
            list: false,
            indexed: false,
            tokenizers: Vec::new(),
            reverse: false,
            count: false,
        }
    }

    /// Mark indexed with the given tokenizers.
    pub fn with_index(mut self, tokenizers: Vec<Tokenizer>) -> Self {
        self.indexed = true;
        self.tokenizers = tokenizers;
        self
    }

    /// Mark list-valued.
    pub fn with_list(mut self) -> Self {
        self.list = true;
        self
    }

    /// Mark reverse-indexed.
    pub fn with_reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Mark count-indexed.
    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }
}

/// Read-only schema catalog interface.
pub trait Catalog: fmt::Debug + Send + Sync {
    /// Declared type of `attr`. Errors if the attribute is undefined.
    fn attr_type(&self, attr: &str) -> Result<AttrType>;

    /// Whether `attr` is list-valued. Undefined attributes are not lists.
    fn is_list(&self, attr: &str) -> bool;

    /// Whether `attr` has an index. Undefined attributes are not indexed.
    fn is_indexed(&self, attr: &str) -> bool;

    /// Tokenizers backing the index of `attr`, in declaration order.
    fn tokenizers(&self, attr: &str) -> Vec<Tokenizer>;
}

/// In-memory catalog.
///
/// Backed by an `RwLock`ed map; concurrent sorts share it read-only.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    attrs: RwLock<HashMap<String, AttrSchema>>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or replace) the schema entry for `attr`.
    pub fn define(&self, attr: impl Into<String>, schema: AttrSchema) {
        self.attrs
            .write()
            .expect("catalog lock poisoned")
            .insert(attr.into(), schema);
    }

    fn get(&self, attr: &str) -> Option<AttrSchema> {
        self.attrs
            .read()
            .expect("catalog lock poisoned")
            .get(attr)
            .cloned()
    }
}

impl Catalog for MemoryCatalog {
    fn attr_type(&self, attr: &str) -> Result<AttrType> {
        self.get(attr)
            .map(|s| s.ty)
            .ok_or_else(|| Error::undefined_attr(attr))
    }

    fn is_list(&self, attr: &str) -> bool {
        self.get(attr).map(|s| s.list).unwrap_or(false)
    }

    fn is_indexed(&self, attr: &str) -> bool {
        self.get(attr).map(|s| s.indexed).unwrap_or(false)
    }

    fn tokenizers(&self, attr: &str) -> Vec<Tokenizer> {
        self.get(attr).map(|s| s.tokenizers).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_query() {
        let catalog = MemoryCatalog::new();
        catalog.define(
            "age",
            AttrSchema::new(AttrType::Int).with_index(vec![Tokenizer::int()]),
        );
        catalog.define("friend", AttrSchema::new(AttrType::Node).with_list());

        assert_eq!(catalog.attr_type("age").unwrap(), AttrType::Int);
        assert!(catalog.is_indexed("age"));
        assert!(!catalog.is_list("age"));
        assert_eq!(catalog.tokenizers("age"), vec![Tokenizer::int()]);

        assert_eq!(catalog.attr_type("friend").unwrap(), AttrType::Node);
        assert!(catalog.is_list("friend"));
        assert!(!catalog.is_indexed("friend"));
    }

    #[test]
    fn test_undefined_attribute() {
        let catalog = MemoryCatalog::new();
        assert!(matches!(
            catalog.attr_type("ghost"),
            Err(Error::UndefinedAttr(_))
        ));
        assert!(!catalog.is_indexed("ghost"));
        assert!(catalog.tokenizers("ghost").is_empty());
    }

    #[test]
    fn test_sortable_selection_order() {
        let catalog = MemoryCatalog::new();
        catalog.define(
            "name",
            AttrSchema::new(AttrType::Str)
                .with_index(vec![Tokenizer::term(), Tokenizer::exact(), Tokenizer::fulltext()]),
        );
        let first_sortable = catalog
            .tokenizers("name")
            .into_iter()
            .find(|t| t.sortable)
            .unwrap();
        assert_eq!(first_sortable, Tokenizer::exact());
    }
}
