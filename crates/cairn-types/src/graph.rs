use std::collections::HashSet;
use std::fmt;

use crate::error::TypeError;
use crate::value::{Node, Value};

/// Index of a node inside an [`ObjectGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An arena of nodes with a designated root.
///
/// Nodes refer to each other with [`Value::Link`], which allows one child to
/// be shared by many parents. Links can also express cycles; those are
/// rejected when the graph is decomposed or materialized.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectGraph {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-node graph whose root owns all of its children inline.
    pub fn from_root(node: Node) -> Self {
        let mut graph = Self::new();
        let id = graph.add(node);
        graph.root = Some(id);
        graph
    }

    /// Add a node and return its id. The first node added becomes the root
    /// unless [`set_root`](Self::set_root) says otherwise.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    pub fn set_root(&mut self, id: NodeId) -> Result<(), TypeError> {
        if id.0 >= self.nodes.len() {
            return Err(TypeError::UnknownNode(id));
        }
        self.root = Some(id);
        Ok(())
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn root_node(&self) -> Option<&Node> {
        self.root.and_then(|id| self.node(id))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Resolve every [`Value::Link`] reachable from the root into an inline
    /// [`Value::Object`], producing a self-contained tree.
    ///
    /// Shared nodes are copied once per parent. The walk keeps its own stack,
    /// so deep chains do not exhaust the thread's stack.
    pub fn materialize(&self) -> Result<Node, TypeError> {
        let root = self.root.ok_or(TypeError::NoRoot)?;
        let mut on_path = HashSet::new();
        let mut stack = vec![self.frame(root, &mut on_path)?];
        let mut tree = None;

        while let Some(frame) = stack.last() {
            if let Some(&child) = frame.links.get(frame.resolved.len()) {
                let child = self.frame(child, &mut on_path)?;
                stack.push(child);
                continue;
            }

            let Some(frame) = stack.pop() else { break };
            on_path.remove(&frame.id);
            let mut resolved = frame.resolved.into_iter();
            let node = frame.node.map_values(|_, value| inline(value, &mut resolved));
            match stack.last_mut() {
                Some(parent) => parent.resolved.push(node),
                None => tree = Some(node),
            }
        }
        tree.ok_or(TypeError::NoRoot)
    }

    fn frame<'a>(
        &'a self,
        id: NodeId,
        on_path: &mut HashSet<NodeId>,
    ) -> Result<Expansion<'a>, TypeError> {
        let node = self.node(id).ok_or(TypeError::UnknownNode(id))?;
        if !on_path.insert(id) {
            return Err(TypeError::Cycle(id));
        }
        let mut links = Vec::new();
        for value in node.properties().values() {
            collect_links(value, &mut links);
        }
        Ok(Expansion {
            id,
            node,
            links,
            resolved: Vec::new(),
        })
    }
}

/// A node being materialized, waiting on its linked children.
struct Expansion<'a> {
    id: NodeId,
    node: &'a Node,
    /// Links in the order [`inline`] consumes them.
    links: Vec<NodeId>,
    resolved: Vec<Node>,
}

fn collect_links(value: &Value, out: &mut Vec<NodeId>) {
    match value {
        Value::Link(id) => out.push(*id),
        Value::Object(node) => node.properties().values().for_each(|v| collect_links(v, out)),
        Value::List(items) => items.iter().for_each(|v| collect_links(v, out)),
        Value::Map(map) => map.values().for_each(|v| collect_links(v, out)),
        _ => {}
    }
}

fn inline(value: &Value, resolved: &mut impl Iterator<Item = Node>) -> Value {
    match value {
        Value::Link(_) => Value::Object(resolved.next().unwrap_or_default()),
        Value::Object(node) => Value::Object(node.map_values(|_, v| inline(v, resolved))),
        Value::List(items) => Value::List(items.iter().map(|v| inline(v, resolved)).collect()),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), inline(v, resolved)))
                .collect(),
        ),
        other => other.clone(),
    }
}
