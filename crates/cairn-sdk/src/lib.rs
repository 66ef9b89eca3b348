//! High-level SDK for cairn.
//!
//! [`Serializer`] decomposes an object graph into content-addressed records,
//! writes them to a primary transport and any number of mirrors, and
//! reassembles graphs from the primary. [`Cairn`] wires a serializer to the
//! local SQLite store and the HTTP mirrors named in a [`CairnConfig`].
//!
//! ```no_run
//! # async fn demo() -> cairn_sdk::SdkResult<()> {
//! use cairn_sdk::{Cairn, CairnConfig, Node};
//!
//! let cairn = Cairn::open(CairnConfig::default())?;
//! let node = Node::new()
//!     .with("name", "Tower A")
//!     .with("site", Node::new().with("city", "Oslo"));
//! let outcome = cairn.serialize_node(&node, None).await?;
//! let back = cairn.deserialize_node(outcome.root, None).await?;
//! assert_eq!(back, node);
//! cairn.close();
//! # Ok(())
//! # }
//! ```

pub mod cairn;
pub mod config;
pub mod error;
pub mod json;
pub mod outcome;
pub mod progress;
pub mod serializer;

pub use cairn::Cairn;
pub use config::CairnConfig;
pub use error::{SdkError, SdkResult};
pub use json::{node_from_json, node_from_str, node_to_json};
pub use outcome::{MirrorReport, MirrorStatus, SerializeOutcome};
pub use progress::{units, Progress};
pub use serializer::{Serializer, SerializerBuilder};

// Re-export key types
pub use cairn_transport::{Transport, WriteFailure};
pub use cairn_types::{Node, NodeId, ObjectGraph, ObjectHash, Record, Value};
