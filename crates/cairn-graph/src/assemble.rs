//! Reassembly of fetched records into an [`ObjectGraph`].

use std::collections::HashMap;

use cairn_types::{Node, NodeId, ObjectGraph, ObjectHash, Value};

use crate::error::{GraphError, GraphResult};

/// Collects parsed nodes by hash and links them into a graph.
///
/// Every distinct hash becomes exactly one node, so a record referenced by
/// several parents comes back as one shared node, as it was before
/// decomposition.
#[derive(Debug, Default)]
pub struct Assembler {
    nodes: HashMap<ObjectHash, Node>,
    order: Vec<ObjectHash>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fetched node. Returns `false` if the hash was already present.
    pub fn insert(&mut self, hash: ObjectHash, node: Node) -> bool {
        if self.nodes.contains_key(&hash) {
            return false;
        }
        self.nodes.insert(hash, node);
        self.order.push(hash);
        true
    }

    pub fn contains(&self, hash: &ObjectHash) -> bool {
        self.nodes.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Hashes a node refers to, in property order, including those nested in
    /// lists and maps.
    pub fn references(node: &Node) -> Vec<ObjectHash> {
        let mut out = Vec::new();
        for value in node.properties().values() {
            collect_references(value, &mut out);
        }
        out
    }

    /// Build the graph rooted at `root`.
    ///
    /// The root becomes node `#0`; the rest follow in insertion order.
    /// References to hashes that were never inserted stay as
    /// [`Value::Reference`].
    pub fn finish(mut self, root: ObjectHash) -> GraphResult<ObjectGraph> {
        if !self.nodes.contains_key(&root) {
            return Err(GraphError::MissingRecord(root));
        }

        let mut ids = HashMap::with_capacity(self.order.len());
        ids.insert(root, NodeId::new(0));
        for hash in self.order.iter().filter(|h| **h != root) {
            let next = NodeId::new(ids.len());
            ids.insert(*hash, next);
        }

        // The first node added becomes the graph root.
        let mut graph = ObjectGraph::new();
        let order = std::iter::once(root)
            .chain(self.order.iter().copied().filter(|h| *h != root));
        for hash in order {
            let Some(node) = self.nodes.remove(&hash) else {
                continue;
            };
            graph.add(node.map_values(|_, value| relink(value, &ids)));
        }
        Ok(graph)
    }
}

fn collect_references(value: &Value, out: &mut Vec<ObjectHash>) {
    match value {
        Value::Reference(hash) => out.push(*hash),
        Value::List(items) => items.iter().for_each(|item| collect_references(item, out)),
        Value::Map(map) => map.values().for_each(|item| collect_references(item, out)),
        Value::Object(node) => {
            for item in node.properties().values() {
                collect_references(item, out);
            }
        }
        _ => {}
    }
}

fn relink(value: &Value, ids: &HashMap<ObjectHash, NodeId>) -> Value {
    match value {
        Value::Reference(hash) => match ids.get(hash) {
            Some(id) => Value::Link(*id),
            None => value.clone(),
        },
        Value::List(items) => Value::List(items.iter().map(|item| relink(item, ids)).collect()),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), relink(v, ids)))
                .collect(),
        ),
        other => other.clone(),
    }
}
