use std::collections::BTreeMap;
use std::io::Write;

use cairn_types::{Node, ObjectHash, Value};
use serde_json::Value as Json;

use crate::error::{CanonError, CanonResult};

/// Key of the placeholder object that stands in for a detached child.
pub const REFERENCE_KEY: &str = "$ref";

/// Encode a node into its canonical byte form.
///
/// Rules:
/// - compact JSON, object keys in byte-wise lexical order;
/// - nulls omitted from nodes and maps, kept inside lists;
/// - integers in plain decimal, floats in shortest round-trip form with
///   `-0.0` written as `0.0`;
/// - references written as `{"$ref":"<hex>"}`.
///
/// Child nodes (`Object`/`Link`) must already be substituted by references.
pub fn canonicalize(node: &Node) -> CanonResult<Vec<u8>> {
    let mut out = Vec::with_capacity(64 + node.len() * 16);
    write_map(&mut out, node.properties())?;
    Ok(out)
}

fn write_map(out: &mut Vec<u8>, map: &BTreeMap<String, Value>) -> CanonResult<()> {
    out.push(b'{');
    let mut first = true;
    for (key, value) in map {
        if value.is_null() {
            continue;
        }
        if key.starts_with('$') {
            return Err(CanonError::ReservedKey { key: key.clone() });
        }
        if !first {
            out.push(b',');
        }
        first = false;
        serde_json::to_writer(&mut *out, key)?;
        out.push(b':');
        write_value(out, key, value)?;
    }
    out.push(b'}');
    Ok(())
}

fn write_value(out: &mut Vec<u8>, key: &str, value: &Value) -> CanonResult<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Integer(i) => write!(out, "{i}").map_err(|e| CanonError::Json(e.to_string()))?,
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(CanonError::NonFiniteFloat { key: key.to_string() });
            }
            let f = if *f == 0.0 { 0.0 } else { *f };
            serde_json::to_writer(&mut *out, &f)?;
        }
        Value::String(s) => serde_json::to_writer(&mut *out, s)?,
        Value::List(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, key, item)?;
            }
            out.push(b']');
        }
        Value::Map(map) => write_map(out, map)?,
        Value::Reference(hash) => {
            out.extend_from_slice(b"{\"$ref\":\"");
            out.extend_from_slice(hash.to_hex().as_bytes());
            out.extend_from_slice(b"\"}");
        }
        Value::Object(_) | Value::Link(_) => {
            return Err(CanonError::UnresolvedChild { key: key.to_string() })
        }
    }
    Ok(())
}

/// Decode canonical bytes back into a node.
///
/// Reference placeholders come back as [`Value::Reference`]; resolving them
/// is the caller's job.
pub fn parse(bytes: &[u8]) -> CanonResult<Node> {
    match serde_json::from_slice::<Json>(bytes)? {
        Json::Object(map) => {
            let mut node = Node::new();
            for (key, value) in map {
                if key.starts_with('$') {
                    return Err(CanonError::ReservedKey { key });
                }
                let value = from_json(&key, value)?;
                node.insert(key, value);
            }
            Ok(node)
        }
        _ => Err(CanonError::NotAnObject),
    }
}

fn from_json(key: &str, value: Json) -> CanonResult<Value> {
    Ok(match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(
                n.as_f64()
                    .ok_or_else(|| CanonError::Json(format!("unrepresentable number {n}")))?,
            ),
        },
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::List(
            items
                .into_iter()
                .map(|item| from_json(key, item))
                .collect::<CanonResult<_>>()?,
        ),
        Json::Object(map) => {
            if let Some(target) = map.get(REFERENCE_KEY) {
                if map.len() != 1 {
                    return Err(CanonError::InvalidReference(format!(
                        "placeholder in {key:?} carries extra keys"
                    )));
                }
                let hex = target.as_str().ok_or_else(|| {
                    CanonError::InvalidReference(format!("non-string target in {key:?}"))
                })?;
                let hash = ObjectHash::from_hex(hex)
                    .map_err(|e| CanonError::InvalidReference(e.to_string()))?;
                return Ok(Value::Reference(hash));
            }
            let mut out = BTreeMap::new();
            for (k, v) in map {
                if k.starts_with('$') {
                    return Err(CanonError::ReservedKey { key: k });
                }
                match from_json(&k, v)? {
                    Value::Null => {}
                    v => {
                        out.insert(k, v);
                    }
                }
            }
            Value::Map(out)
        }
    })
}
