//! Depth-first decomposition of an object graph into records.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use cairn_canon::ContentHasher;
use cairn_types::{Node, NodeId, ObjectGraph, ObjectHash, Record, Value};

use crate::error::{GraphError, GraphResult};

/// The result of decomposing a graph.
#[derive(Clone, Debug)]
pub struct Decomposition {
    /// Hash of the root node's record.
    pub root: ObjectHash,
    /// Distinct records, children before the parents that reference them.
    pub records: Vec<Record>,
    /// Node visits, counting every reference to a shared node.
    pub visited: usize,
}

impl Decomposition {
    /// Total canonical bytes across all records.
    pub fn total_bytes(&self) -> u64 {
        self.records.iter().map(|r| r.size).sum()
    }

    pub fn hashes(&self) -> HashSet<ObjectHash> {
        self.records.iter().map(|r| r.hash).collect()
    }
}

/// Decompose the graph reachable from its root.
pub fn decompose(graph: &ObjectGraph) -> GraphResult<Decomposition> {
    let root = graph.root().ok_or(GraphError::NoRoot)?;
    let mut walker = Walker::new(graph);
    let hash = walker.run(Child::Link(root))?;
    debug!(
        root = %hash,
        records = walker.records.len(),
        visited = walker.visited,
        "graph decomposed"
    );
    Ok(walker.finish(hash))
}

/// Decompose a self-contained tree of inline [`Value::Object`] children.
///
/// The tree cannot contain [`Value::Link`]s since there is no arena for
/// them to point into.
pub fn decompose_node(node: &Node) -> GraphResult<Decomposition> {
    let empty = ObjectGraph::new();
    let mut walker = Walker::new(&empty);
    let hash = walker.run(Child::Object(node))?;
    Ok(walker.finish(hash))
}

enum Visit {
    InProgress,
    Done(ObjectHash),
}

/// A child edge: an arena link or an owned inline node.
#[derive(Clone, Copy)]
enum Child<'g> {
    Link(NodeId),
    Object(&'g Node),
}

/// One node on the explicit DFS stack.
struct Frame<'g> {
    /// Set for arena nodes, so the visit can be marked done.
    id: Option<NodeId>,
    node: &'g Node,
    children: Vec<Child<'g>>,
    /// Hashes of `children[..hashes.len()]`, in the same order.
    hashes: Vec<ObjectHash>,
}

impl<'g> Frame<'g> {
    fn new(id: Option<NodeId>, node: &'g Node) -> Self {
        let mut children = Vec::new();
        for value in node.properties().values() {
            collect_children(value, &mut children);
        }
        Self {
            id,
            node,
            children,
            hashes: Vec::new(),
        }
    }

    fn next_child(&self) -> Option<Child<'g>> {
        self.children.get(self.hashes.len()).copied()
    }
}

struct Walker<'g> {
    graph: &'g ObjectGraph,
    state: HashMap<NodeId, Visit>,
    emitted: HashSet<ObjectHash>,
    records: Vec<Record>,
    visited: usize,
}

impl<'g> Walker<'g> {
    fn new(graph: &'g ObjectGraph) -> Self {
        Self {
            graph,
            state: HashMap::new(),
            emitted: HashSet::new(),
            records: Vec::new(),
            visited: 0,
        }
    }

    fn finish(self, root: ObjectHash) -> Decomposition {
        Decomposition {
            root,
            records: self.records,
            visited: self.visited,
        }
    }

    /// Post-order walk from `start` on a heap stack, so graph depth is not
    /// bounded by the thread's stack.
    fn run(&mut self, start: Child<'g>) -> GraphResult<ObjectHash> {
        let mut stack = Vec::new();
        let mut last = match self.enter(start, &mut stack)? {
            Some(hash) => return Ok(hash),
            None => ObjectHash::null(),
        };

        // The loop ends when the start frame is popped, so `last` is its hash.
        while let Some(frame) = stack.last() {
            if let Some(child) = frame.next_child() {
                if let Some(hash) = self.enter(child, &mut stack)? {
                    if let Some(frame) = stack.last_mut() {
                        frame.hashes.push(hash);
                    }
                }
                continue;
            }

            let Some(frame) = stack.pop() else { break };
            last = self.complete(frame)?;
            if let Some(parent) = stack.last_mut() {
                parent.hashes.push(last);
            }
        }
        Ok(last)
    }

    /// Start visiting `child`. Returns its hash when it is already known,
    /// otherwise pushes a frame for it.
    fn enter(
        &mut self,
        child: Child<'g>,
        stack: &mut Vec<Frame<'g>>,
    ) -> GraphResult<Option<ObjectHash>> {
        self.visited += 1;
        match child {
            Child::Object(node) => stack.push(Frame::new(None, node)),
            Child::Link(id) => {
                match self.state.get(&id) {
                    Some(Visit::Done(hash)) => return Ok(Some(*hash)),
                    Some(Visit::InProgress) => return Err(GraphError::Cycle { node: id }),
                    None => {}
                }
                let graph = self.graph;
                let node = graph.node(id).ok_or(GraphError::UnknownNode(id))?;
                self.state.insert(id, Visit::InProgress);
                stack.push(Frame::new(Some(id), node));
            }
        }
        Ok(None)
    }

    /// Substitute the frame's children by their hashes, then hash it.
    fn complete(&mut self, frame: Frame<'g>) -> GraphResult<ObjectHash> {
        let mut cursor = 0;
        let substituted = frame
            .node
            .map_values(|_, value| substitute(value, &frame.hashes, &mut cursor));
        let (hash, bytes) = ContentHasher::NODE.hash_node(&substituted)?;
        if self.emitted.insert(hash) {
            self.records.push(Record::new(hash, bytes));
        }
        if let Some(id) = frame.id {
            self.state.insert(id, Visit::Done(hash));
        }
        Ok(hash)
    }
}

/// Child edges of one value, in the order [`substitute`] consumes them.
fn collect_children<'g>(value: &'g Value, out: &mut Vec<Child<'g>>) {
    match value {
        Value::Object(node) => out.push(Child::Object(node)),
        Value::Link(id) => out.push(Child::Link(*id)),
        Value::List(items) => items.iter().for_each(|item| collect_children(item, out)),
        Value::Map(map) => map.values().for_each(|item| collect_children(item, out)),
        _ => {}
    }
}

/// Replace child edges by their hashes. `hashes` is in
/// [`collect_children`] order and `cursor` tracks the next one.
fn substitute(value: &Value, hashes: &[ObjectHash], cursor: &mut usize) -> Value {
    match value {
        Value::Object(_) | Value::Link(_) => {
            let hash = hashes[*cursor];
            *cursor += 1;
            Value::Reference(hash)
        }
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|item| substitute(item, hashes, cursor))
                .collect(),
        ),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, hashes, cursor)))
                .collect(),
        ),
        other => other.clone(),
    }
}
