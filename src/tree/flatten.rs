//! Flatten a populated tree into single-leaf documents and back.
//!
//! Leaf `[p1..pn]` with value `v` becomes `{p1:{...{pn:v}}}`. Leaves that
//! were never populated are not representable and are skipped.

use super::node::{LeafNode, Located, ParameterNode, ParameterTree};
use crate::error::ApiError;
use crate::types::ParamPath;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Ordered single-leaf documents, one per populated leaf.
pub fn flatten(tree: &ParameterTree) -> Vec<Value> {
    let mut documents = Vec::new();
    for (path, leaf) in tree.leaves() {
        match &leaf.value {
            Some(value) => documents.push(path.wrap(value.clone())),
            None => debug!(path = %path, "Skipping unpopulated leaf"),
        }
    }
    documents
}

/// Rebuild a tree from single-leaf documents.
///
/// Limits are not carried by documents, so every leaf gets an empty
/// descriptor. A later document for the same path replaces an earlier one.
/// Without a schema a value that is itself a one-key object reads as a
/// deeper path; [`unflatten_with`] resolves that.
pub fn unflatten(documents: &[Value]) -> Result<ParameterTree, ApiError> {
    let mut tree = ParameterTree::new();
    for document in documents {
        let (path, value) = ParamPath::from_document(document)?;
        tree.insert_leaf(&path, LeafNode::with_value(Default::default(), value))?;
    }
    Ok(tree)
}

/// Rebuild a tree from single-leaf documents, splitting path from value
/// where `schema` has its leaves. Leaves keep their schema limits.
pub fn unflatten_with(schema: &ParameterTree, documents: &[Value]) -> Result<ParameterTree, ApiError> {
    let mut tree = ParameterTree::new();
    for document in documents {
        match schema.locate(document)? {
            Located::Leaf { path, leaf, value } => {
                tree.insert_leaf(&path, LeafNode::with_value(leaf.limits.clone(), value))?
            }
            Located::Unknown(path) => return Err(ApiError::UnknownParameter(path)),
        }
    }
    Ok(tree)
}

/// Nested document holding every populated value of `tree`.
pub fn to_value_document(tree: &ParameterTree) -> Value {
    let mut root = Value::Object(Map::new());
    for document in flatten(tree) {
        merge_into(&mut root, document);
    }
    root
}

/// Split a nested value document into single-leaf documents.
///
/// Non-empty objects are descended into; anything else is a leaf value.
/// Object-valued parameters cannot be told apart from namespaces in this
/// form, which is why snapshots store the flattened list.
pub fn flatten_value_document(document: &Value) -> Vec<Value> {
    fn walk(path: &ParamPath, value: &Value, out: &mut Vec<Value>) {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    walk(&path.child(key), child, out);
                }
            }
            leaf if !path.is_root() => out.push(path.wrap(leaf.clone())),
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(&ParamPath::root(), document, &mut out);
    out
}

/// Split a nested value document at the leaves of `schema`.
///
/// Values under a schema leaf are kept whole. Keys the schema does not know
/// are split the schemaless way so callers can still report them.
pub fn split_value_document(schema: &ParameterTree, document: &Value) -> Vec<Value> {
    fn walk(children: &BTreeMap<String, ParameterNode>, path: &ParamPath, value: &Value, out: &mut Vec<Value>) {
        let map = match value.as_object() {
            Some(map) => map,
            None => {
                out.push(path.wrap(value.clone()));
                return;
            }
        };
        for (key, child) in map {
            let child_path = path.child(key);
            match children.get(key) {
                Some(ParameterNode::Leaf(_)) => out.push(child_path.wrap(child.clone())),
                Some(ParameterNode::Internal(next)) => walk(next, &child_path, child, out),
                None => out.extend(flatten_value_document(&child_path.wrap(child.clone()))),
            }
        }
    }
    let mut out = Vec::new();
    if document.is_object() {
        walk(schema.children(), &ParamPath::root(), document, &mut out);
    }
    out
}

fn merge_into(target: &mut Value, document: Value) {
    match (target, document) {
        (Value::Object(target_map), Value::Object(doc_map)) => {
            for (key, value) in doc_map {
                match target_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_into(existing, value)
                    }
                    _ => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target, document) => *target = document,
    }
}
