//! Key codec for data and index entries.
//!
//! Layout (all multi-byte integers big-endian):
//!
//! ```text
//! [kind: u8][attr len: u16][attr bytes][payload]
//! ```
//!
//! - data keys: payload is the `u64` uid
//! - index keys: payload is the token, whose **first byte is the tokenizer
//!   id**
//!
//! Two properties the sort engine relies on:
//!
//! 1. All index keys for one `(attr, tokenizer)` pair form a contiguous byte
//!    range, so a prefix seek walks exactly one index.
//! 2. For sortable tokenizers the token bytes order like the values they
//!    tokenize, so walking the range in byte order walks values in order.

use crate::error::{Error, Result};
use crate::ids::Uid;

/// Kind byte for data keys.
pub const KIND_DATA: u8 = 0x00;
/// Kind byte for index keys.
pub const KIND_INDEX: u8 = 0x02;

fn key_with_payload(kind: u8, attr: &str, payload_len: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 2 + attr.len() + payload_len);
    key.push(kind);
    key.extend_from_slice(&(attr.len() as u16).to_be_bytes());
    key.extend_from_slice(attr.as_bytes());
    key
}

/// Key under which the value posting for `(attr, uid)` lives.
pub fn data_key(attr: &str, uid: Uid) -> Vec<u8> {
    let mut key = key_with_payload(KIND_DATA, attr, 8);
    key.extend_from_slice(&uid.to_be_bytes());
    key
}

/// Key of the index bucket for `token` under `attr`.
///
/// The token carries its tokenizer id as its first byte.
pub fn index_key(attr: &str, token: &[u8]) -> Vec<u8> {
    let mut key = key_with_payload(KIND_INDEX, attr, token.len());
    key.extend_from_slice(token);
    key
}

/// Smallest key of the `(attr, tokenizer)` index range.
///
/// `index_prefix(attr, id + 1)` is the exclusive upper bound of the range,
/// which a descending walk uses as its seek target.
pub fn index_prefix(attr: &str, tokenizer_id: u8) -> Vec<u8> {
    index_key(attr, &[tokenizer_id])
}

/// A parsed data or index key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedKey {
    /// Value posting key
    Data {
        /// Attribute name
        attr: String,
        /// Node identifier
        uid: Uid,
    },
    /// Index bucket key
    Index {
        /// Attribute name
        attr: String,
        /// Token, tokenizer id first
        token: Vec<u8>,
    },
}

impl ParsedKey {
    /// Parse raw key bytes.
    pub fn parse(key: &[u8]) -> Result<ParsedKey> {
        if key.len() < 3 {
            return Err(Error::malformed_key(format!("{} bytes is too short", key.len())));
        }
        let kind = key[0];
        let attr_len = u16::from_be_bytes([key[1], key[2]]) as usize;
        let payload_at = 3 + attr_len;
        if key.len() < payload_at {
            return Err(Error::malformed_key("attribute extends past key end"));
        }
        let attr = std::str::from_utf8(&key[3..payload_at])
            .map_err(|e| Error::malformed_key(e.to_string()))?
            .to_string();
        let payload = &key[payload_at..];
        match kind {
            KIND_DATA => {
                let bytes: [u8; 8] = payload
                    .try_into()
                    .map_err(|_| Error::malformed_key("data key payload is not 8 bytes"))?;
                Ok(ParsedKey::Data {
                    attr,
                    uid: Uid::from_be_bytes(bytes),
                })
            }
            KIND_INDEX => {
                if payload.is_empty() {
                    return Err(Error::malformed_key("index key has no token"));
                }
                Ok(ParsedKey::Index {
                    attr,
                    token: payload.to_vec(),
                })
            }
            other => Err(Error::malformed_key(format!("unknown kind byte {other:#04x}"))),
        }
    }

    /// Whether this is an index key.
    pub fn is_index(&self) -> bool {
        matches!(self, ParsedKey::Index { .. })
    }

    /// The token of an index key.
    pub fn token(&self) -> Option<&[u8]> {
        match self {
            ParsedKey::Index { token, .. } => Some(token),
            ParsedKey::Data { .. } => None,
        }
    }
}
