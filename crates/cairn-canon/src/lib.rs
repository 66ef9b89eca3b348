//! Canonical encoding and content hashing for cairn nodes.
//!
//! A node's identity is the domain-separated BLAKE3 hash of its canonical
//! form: compact JSON with sorted keys, nulls omitted, and every child
//! replaced by a `{"$ref": "<hash>"}` placeholder. The same node always
//! encodes to the same bytes on every machine.

pub mod canonical;
pub mod error;
pub mod hasher;

pub use canonical::{canonicalize, parse, REFERENCE_KEY};
pub use error::{CanonError, CanonResult};
pub use hasher::ContentHasher;
