//! Conversion between plain JSON documents and [`Node`] trees.
//!
//! Every nested JSON object becomes a child node with its own record, so a
//! document's sub-objects deduplicate across documents. Arrays stay inline.

use serde_json::{Map, Number, Value as Json};

use cairn_canon::REFERENCE_KEY;
use cairn_types::{Node, Value};

use crate::error::{SdkError, SdkResult};

/// Key used when rendering an unresolved in-graph link.
pub const LINK_KEY: &str = "$link";

/// Build a node tree from a JSON document. The top level must be an object.
pub fn node_from_json(json: &Json) -> SdkResult<Node> {
    match json {
        Json::Object(map) => node_from_map(map),
        other => Err(SdkError::Json(format!(
            "expected a JSON object at the top level, found {}",
            kind(other)
        ))),
    }
}

/// Parse JSON text into a node tree.
pub fn node_from_str(text: &str) -> SdkResult<Node> {
    let json: Json = serde_json::from_str(text).map_err(|e| SdkError::Json(e.to_string()))?;
    node_from_json(&json)
}

fn node_from_map(map: &Map<String, Json>) -> SdkResult<Node> {
    let mut node = Node::new();
    for (key, value) in map {
        if key.starts_with('$') {
            return Err(SdkError::Json(format!("key {key:?} is reserved")));
        }
        if value.is_null() {
            continue;
        }
        node.insert(key.clone(), value_from_json(value)?);
    }
    Ok(node)
}

fn value_from_json(json: &Json) -> SdkResult<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => number(n),
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::List(
            items
                .iter()
                .map(value_from_json)
                .collect::<SdkResult<_>>()?,
        ),
        Json::Object(map) => Value::Object(node_from_map(map)?),
    })
}

fn number(n: &Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::Integer(i),
        // u64 beyond i64 and every fractional number
        None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}

/// Render a node tree as JSON.
///
/// Unresolved references render as `{"$ref": "<hex>"}` and arena links as
/// `{"$link": <index>}`. Non-finite floats become `null`.
pub fn node_to_json(node: &Node) -> Json {
    Json::Object(map_to_json(node.iter()))
}

fn map_to_json<'a>(entries: impl Iterator<Item = (&'a String, &'a Value)>) -> Map<String, Json> {
    entries
        .map(|(key, value)| (key.clone(), value_to_json(value)))
        .collect()
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(i) => Json::from(*i),
        Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        Value::String(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => Json::Object(map_to_json(map.iter())),
        Value::Object(node) => node_to_json(node),
        Value::Link(id) => {
            let mut map = Map::new();
            map.insert(LINK_KEY.to_string(), Json::from(id.index()));
            Json::Object(map)
        }
        Value::Reference(hash) => {
            let mut map = Map::new();
            map.insert(REFERENCE_KEY.to_string(), Json::String(hash.to_hex()));
            Json::Object(map)
        }
    }
}

fn kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
