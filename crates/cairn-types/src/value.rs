use std::collections::BTreeMap;

use crate::graph::NodeId;
use crate::object::ObjectHash;

/// A property value held by a [`Node`].
///
/// `Map` is an inline mapping that stays inside its parent's record.
/// `Object` and `Link` are child nodes: the decomposer detaches each into its
/// own record and leaves a `Reference` behind in the parent.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Owned nested node.
    Object(Node),
    /// Edge to another node in the same [`ObjectGraph`](crate::ObjectGraph).
    Link(NodeId),
    /// Placeholder for an already-persisted record.
    Reference(ObjectHash),
}

impl Value {
    /// Returns `true` for values the decomposer detaches into their own record.
    pub fn is_child(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Link(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Object(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectHash> {
        match self {
            Self::Reference(hash) => Some(*hash),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => present(a).eq(present(b)),
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Link(a), Self::Link(b)) => a == b,
            (Self::Reference(a), Self::Reference(b)) => a == b,
            _ => false,
        }
    }
}

fn present(map: &BTreeMap<String, Value>) -> impl Iterator<Item = (&String, &Value)> {
    map.iter().filter(|(_, value)| !value.is_null())
}

/// Null entries are dropped.
impl From<BTreeMap<String, Value>> for Value {
    fn from(mut v: BTreeMap<String, Value>) -> Self {
        v.retain(|_, value| !value.is_null());
        Self::Map(v)
    }
}

impl From<Node> for Value {
    fn from(v: Node) -> Self {
        Self::Object(v)
    }
}

impl From<NodeId> for Value {
    fn from(v: NodeId) -> Self {
        Self::Link(v)
    }
}

impl From<ObjectHash> for Value {
    fn from(v: ObjectHash) -> Self {
        Self::Reference(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// An object node: a mapping from property name to [`Value`].
///
/// Nulls are never stored: inserting [`Value::Null`] removes the property.
/// Transient properties ride along in memory but take no part in identity,
/// equality, or persistence.
#[derive(Clone, Debug, Default)]
pub struct Node {
    properties: BTreeMap<String, Value>,
    transient: BTreeMap<String, Value>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a property, returning the previous value. `Null` removes it.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        match value.into() {
            Value::Null => self.properties.remove(&key),
            value => self.properties.insert(key, value),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.properties.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Persisted properties in key order.
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Attach an in-memory-only property.
    pub fn set_transient(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.transient.insert(key.into(), value.into());
    }

    pub fn transient(&self, key: &str) -> Option<&Value> {
        self.transient.get(key)
    }

    /// Rebuild this node with every value passed through `f`.
    ///
    /// Transient properties are carried over untouched.
    pub fn try_map_values<E>(
        &self,
        mut f: impl FnMut(&str, &Value) -> Result<Value, E>,
    ) -> Result<Node, E> {
        let mut properties = BTreeMap::new();
        for (key, value) in &self.properties {
            match f(key, value)? {
                Value::Null => {}
                mapped => {
                    properties.insert(key.clone(), mapped);
                }
            }
        }
        Ok(Node {
            properties,
            transient: self.transient.clone(),
        })
    }

    /// Infallible form of [`try_map_values`](Self::try_map_values).
    pub fn map_values(&self, mut f: impl FnMut(&str, &Value) -> Value) -> Node {
        match self.try_map_values::<std::convert::Infallible>(|k, v| Ok(f(k, v))) {
            Ok(node) => node,
            Err(never) => match never {},
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.properties == other.properties
    }
}

impl FromIterator<(String, Value)> for Node {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut node = Node::new();
        for (key, value) in iter {
            node.insert(key, value);
        }
        node
    }
}
