//! Object graph decomposition and reassembly.
//!
//! [`decompose`] walks an [`ObjectGraph`](cairn_types::ObjectGraph) depth-first,
//! detaches every child node into its own [`Record`](cairn_types::Record), and
//! returns the records bottom-up together with the root hash. [`Assembler`]
//! does the reverse: it collects fetched nodes and links them back into a
//! graph, one node per distinct hash.
//!
//! # Invariants
//!
//! - Children are hashed before the parents that reference them, so a
//!   record's hash commits to its whole subgraph.
//! - Each distinct hash is emitted once, however many parents share it.
//! - Cycles are a structural error and are reported before anything is
//!   written.

pub mod assemble;
pub mod decompose;
pub mod error;

pub use assemble::Assembler;
pub use decompose::{decompose, decompose_node, Decomposition};
pub use error::{GraphError, GraphResult};
