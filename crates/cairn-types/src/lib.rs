//! Foundation types for cairn, the content-addressed object graph store.
//!
//! Every other cairn crate depends on `cairn-types`.
//!
//! # Key Types
//!
//! - [`ObjectHash`]: Content-addressed identifier (BLAKE3 digest)
//! - [`Node`] / [`Value`]: In-memory object nodes and their property values
//! - [`ObjectGraph`] / [`NodeId`]: Arena graph with shared children
//! - [`Record`]: The persisted unit: hash plus canonical bytes

pub mod error;
pub mod graph;
pub mod object;
pub mod record;
pub mod value;

pub use error::TypeError;
pub use graph::{NodeId, ObjectGraph};
pub use object::ObjectHash;
pub use record::Record;
pub use value::{Node, Value};
