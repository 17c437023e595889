//! JSON encoding of the AST, for tools that want to inspect reader output without linking
//! against this crate's types.
//!
//! | AST | JSON |
//! |---|---|
//! | `Int`, `Bool`, `Str` | number, boolean, string |
//! | `Symbol(clk)` | `{"var": "clk"}` |
//! | `Operator(+)` | `{"op": "+"}` |
//! | `List` | array |
//! | `ExpandGroup` | `{"expand": [...]}` |
//!
//! Structural operators use their canonical spellings, e.g. `{"op": "rel-eval"}`.

use serde::Deserialize;
use serde_json::json;

use crate::ast::{Node, Operator, Symbol};
use crate::{Error, MAX_PARSE_DEPTH};

/// Render a node as a compact JSON string
pub fn ast_to_json(node: &Node) -> Result<String, Error> {
    serde_json::to_string(&node_to_json(node))
        .map_err(|e| Error::Json(format!("Failed to serialize JSON: {e}")))
}

/// Convert a node to a `serde_json::Value`
pub fn node_to_json(node: &Node) -> serde_json::Value {
    match node {
        Node::Int(n) => serde_json::Value::Number(serde_json::Number::from(*n)),
        Node::Bool(b) => serde_json::Value::Bool(*b),
        Node::Str(s) => serde_json::Value::String(s.clone()),
        Node::Symbol(s) => json!({"var": s.name()}),
        Node::Operator(o) => json!({"op": o.spelling()}),
        Node::List(elements) => {
            serde_json::Value::Array(elements.iter().map(node_to_json).collect())
        }
        Node::ExpandGroup(members) => {
            json!({"expand": members.iter().map(node_to_json).collect::<Vec<_>>()})
        }
    }
}

/// Nesting accepted by [`parse_json`]. One level of reader nesting encodes to at most
/// four JSON levels, e.g. `(...)@<1>` becomes `{"expand": [[{"op": "rel-eval"}, [...], 1]]}`.
pub const MAX_JSON_DEPTH: usize = 4 * MAX_PARSE_DEPTH + 2;

/// Parse a JSON document produced by [`ast_to_json`] back into a node
pub fn parse_json(input: &str) -> Result<Node, Error> {
    if json_nesting(input) > MAX_JSON_DEPTH {
        return Err(Error::Json(format!(
            "JSON document too deeply nested (max depth: {MAX_JSON_DEPTH})"
        )));
    }
    // Depth is bounded above, so serde_json's own recursion limit is lifted
    let mut deserializer = serde_json::Deserializer::from_str(input);
    deserializer.disable_recursion_limit();
    let json_value = serde_json::Value::deserialize(&mut deserializer)
        .and_then(|value| deserializer.end().map(|()| value))
        .map_err(|e| Error::Json(format!("Invalid JSON: {e}")))?;
    json_to_node(json_value)
}

/// Deepest bracket nesting of `input`, ignoring brackets inside string literals
fn json_nesting(input: &str) -> usize {
    let (mut depth, mut deepest) = (0usize, 0usize);
    let mut in_string = false;
    let mut escaped = false;
    for c in input.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

fn json_to_node(json: serde_json::Value) -> Result<Node, Error> {
    match json {
        serde_json::Value::Null => Err(Error::Json("null has no AST counterpart".into())),
        serde_json::Value::Bool(b) => Ok(Node::Bool(b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Node::Int)
            .ok_or_else(|| Error::Json(format!("Number too large or not integer: {n}"))),
        serde_json::Value::String(s) => Ok(Node::Str(s)),
        serde_json::Value::Array(arr) => Ok(Node::List(json_array(arr)?)),
        serde_json::Value::Object(obj) => {
            let mut iter = obj.into_iter();
            let (key, value) = match (iter.next(), iter.next()) {
                (Some(entry), None) => entry,
                _ => {
                    return Err(Error::Json(
                        "AST objects must have exactly one key".into(),
                    ));
                }
            };
            match (key.as_str(), value) {
                ("var", serde_json::Value::String(name)) => {
                    if Operator::from_reserved(&name).is_some() {
                        return Err(Error::Json(format!(
                            "'{name}' is an operator spelling and cannot name a symbol"
                        )));
                    }
                    Ok(Node::Symbol(Symbol::new(name)))
                }
                ("op", serde_json::Value::String(spelling)) => Operator::from_spelling(&spelling)
                    .map(Node::Operator)
                    .ok_or_else(|| Error::Json(format!("Unknown operator: '{spelling}'"))),
                ("expand", serde_json::Value::Array(arr)) => {
                    Ok(Node::ExpandGroup(json_array(arr)?))
                }
                (key, _) => Err(Error::Json(format!("Unexpected AST object: '{key}'"))),
            }
        }
    }
}

fn json_array(arr: Vec<serde_json::Value>) -> Result<Vec<Node>, Error> {
    arr.into_iter().map(json_to_node).collect()
}
