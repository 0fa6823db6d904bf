//! Parameter tree node types.

use crate::error::ApiError;
use crate::types::ParamPath;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Constraint metadata a device reports for one leaf.
///
/// Opaque apart from `const`, `writeable` and the numeric `min`/`max` bounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LimitsDescriptor(Map<String, Value>);

impl LimitsDescriptor {
    pub fn from_map(map: Map<String, Value>) -> Self {
        LimitsDescriptor(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_const(&self) -> bool {
        self.0.get("const").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn writeable(&self) -> Option<bool> {
        self.0.get("writeable").and_then(Value::as_bool)
    }

    /// Explicitly denied writes. Absent flags never deny.
    pub fn denies_write(&self) -> bool {
        self.is_const() || self.writeable() == Some(false)
    }

    pub fn min(&self) -> Option<f64> {
        self.0.get("min").and_then(Value::as_f64)
    }

    pub fn max(&self) -> Option<f64> {
        self.0.get("max").and_then(Value::as_f64)
    }
}

/// A single settable/queriable parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeafNode {
    pub limits: LimitsDescriptor,
    pub value: Option<Value>,
}

impl LeafNode {
    pub fn new(limits: LimitsDescriptor) -> Self {
        Self {
            limits,
            value: None,
        }
    }

    pub fn with_value(limits: LimitsDescriptor, value: Value) -> Self {
        Self {
            limits,
            value: Some(value),
        }
    }
}

/// Internal namespace or parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterNode {
    Internal(BTreeMap<String, ParameterNode>),
    Leaf(LeafNode),
}

impl ParameterNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, ParameterNode::Leaf(_))
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            ParameterNode::Leaf(leaf) => Some(leaf),
            ParameterNode::Internal(_) => None,
        }
    }
}

/// Where a single-leaf document lands in a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Located<'t> {
    /// The document addresses `path`; `value` is everything below it.
    Leaf {
        path: ParamPath,
        leaf: &'t LeafNode,
        value: Value,
    },
    /// The document leaves the schema at the last segment of this path.
    Unknown(ParamPath),
}

/// Discovered namespace of one device.
///
/// Children are kept in a `BTreeMap`, so traversal and flattening order is
/// lexicographic and stable across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterTree {
    root: BTreeMap<String, ParameterNode>,
}

impl ParameterTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_children(root: BTreeMap<String, ParameterNode>) -> Self {
        Self { root }
    }

    pub fn children(&self) -> &BTreeMap<String, ParameterNode> {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Insert a leaf, creating internal nodes along the way.
    ///
    /// Fails if the path would pass through an existing leaf or land on an
    /// existing internal node.
    pub fn insert_leaf(&mut self, path: &ParamPath, leaf: LeafNode) -> Result<(), ApiError> {
        let (last, parents) = path
            .segments()
            .split_last()
            .ok_or_else(|| ApiError::InvalidPath("cannot insert a leaf at the root".to_string()))?;

        let mut children = &mut self.root;
        for segment in parents {
            let node = children
                .entry(segment.clone())
                .or_insert_with(|| ParameterNode::Internal(BTreeMap::new()));
            children = match node {
                ParameterNode::Internal(map) => map,
                ParameterNode::Leaf(_) => {
                    return Err(ApiError::InvalidPath(format!(
                        "{} passes through leaf {}",
                        path, segment
                    )))
                }
            };
        }

        match children.get_mut(last) {
            Some(ParameterNode::Internal(_)) => Err(ApiError::InvalidPath(format!(
                "{} addresses an internal node",
                path
            ))),
            Some(ParameterNode::Leaf(existing)) => {
                *existing = leaf;
                Ok(())
            }
            None => {
                children.insert(last.clone(), ParameterNode::Leaf(leaf));
                Ok(())
            }
        }
    }

    pub fn get(&self, path: &ParamPath) -> Option<&ParameterNode> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.root.get(first)?;
        for segment in rest {
            node = match node {
                ParameterNode::Internal(map) => map.get(segment)?,
                ParameterNode::Leaf(_) => return None,
            };
        }
        Some(node)
    }

    pub fn leaf(&self, path: &ParamPath) -> Option<&LeafNode> {
        self.get(path).and_then(ParameterNode::as_leaf)
    }

    pub fn leaf_mut(&mut self, path: &ParamPath) -> Option<&mut LeafNode> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.root.get_mut(first)?;
        for segment in rest {
            node = match node {
                ParameterNode::Internal(map) => map.get_mut(segment)?,
                ParameterNode::Leaf(_) => return None,
            };
        }
        match node {
            ParameterNode::Leaf(leaf) => Some(leaf),
            ParameterNode::Internal(_) => None,
        }
    }

    /// Whether the device exposes `path` as a parameter.
    pub fn contains(&self, path: &ParamPath) -> bool {
        self.leaf(path).is_some()
    }

    pub fn limits(&self, path: &ParamPath) -> Option<&LimitsDescriptor> {
        self.leaf(path).map(|leaf| &leaf.limits)
    }

    /// Walk `document` along this tree until it reaches a leaf.
    ///
    /// Namespace levels must hold exactly one key. Whatever sits below the
    /// leaf is its value, including objects of any shape.
    pub fn locate<'t>(&'t self, document: &Value) -> Result<Located<'t>, ApiError> {
        let mut path = ParamPath::root();
        let mut children = &self.root;
        let mut current = document;
        loop {
            let (key, rest) = single_entry(current).ok_or_else(|| {
                ApiError::InvalidPath(format!(
                    "document does not address one parameter below {}: {}",
                    path, document
                ))
            })?;
            path = path.child(key);
            match children.get(key) {
                None => return Ok(Located::Unknown(path)),
                Some(ParameterNode::Leaf(leaf)) => {
                    return Ok(Located::Leaf {
                        path,
                        leaf,
                        value: rest.clone(),
                    })
                }
                Some(ParameterNode::Internal(next)) => {
                    children = next;
                    current = rest;
                }
            }
        }
    }

    /// All leaves in depth-first order.
    pub fn leaves(&self) -> Vec<(ParamPath, &LeafNode)> {
        let mut out = Vec::new();
        collect_leaves(&self.root, &ParamPath::root(), &mut out);
        out
    }

    pub fn leaf_paths(&self) -> Vec<ParamPath> {
        self.leaves().into_iter().map(|(path, _)| path).collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    /// Same shape with every value dropped.
    pub fn schema_only(&self) -> ParameterTree {
        fn strip(node: &ParameterNode) -> ParameterNode {
            match node {
                ParameterNode::Internal(map) => ParameterNode::Internal(
                    map.iter().map(|(k, v)| (k.clone(), strip(v))).collect(),
                ),
                ParameterNode::Leaf(leaf) => ParameterNode::Leaf(LeafNode::new(leaf.limits.clone())),
            }
        }
        ParameterTree {
            root: self
                .root
                .iter()
                .map(|(k, v)| (k.clone(), strip(v)))
                .collect(),
        }
    }

    /// Schema cache representation: leaves become `[limits]`.
    pub fn to_schema_json(&self) -> Value {
        fn encode(node: &ParameterNode) -> Value {
            match node {
                ParameterNode::Internal(map) => Value::Object(
                    map.iter().map(|(k, v)| (k.clone(), encode(v))).collect(),
                ),
                ParameterNode::Leaf(leaf) => {
                    Value::Array(vec![Value::Object(leaf.limits.as_map().clone())])
                }
            }
        }
        Value::Object(self.root.iter().map(|(k, v)| (k.clone(), encode(v))).collect())
    }

    /// Inverse of [`ParameterTree::to_schema_json`].
    pub fn from_schema_json(value: &Value) -> Result<Self, ApiError> {
        fn decode(path: &ParamPath, value: &Value) -> Result<ParameterNode, ApiError> {
            match value {
                Value::Object(map) => {
                    let mut children = BTreeMap::new();
                    for (key, child) in map {
                        children.insert(key.clone(), decode(&path.child(key), child)?);
                    }
                    Ok(ParameterNode::Internal(children))
                }
                Value::Array(items) => {
                    let limits = match items.as_slice() {
                        [Value::Object(map)] => LimitsDescriptor::from_map(map.clone()),
                        [] | [Value::Null] => LimitsDescriptor::default(),
                        _ => {
                            return Err(ApiError::StorageError(format!(
                                "schema leaf {} must hold one limits object",
                                path
                            )))
                        }
                    };
                    Ok(ParameterNode::Leaf(LeafNode::new(limits)))
                }
                other => Err(ApiError::StorageError(format!(
                    "unexpected schema entry at {}: {}",
                    path, other
                ))),
            }
        }

        match decode(&ParamPath::root(), value)? {
            ParameterNode::Internal(root) => Ok(ParameterTree { root }),
            ParameterNode::Leaf(_) => Err(ApiError::StorageError(
                "schema root must be an object".to_string(),
            )),
        }
    }
}

fn single_entry(value: &Value) -> Option<(&String, &Value)> {
    match value.as_object() {
        Some(map) if map.len() == 1 => map.iter().next(),
        _ => None,
    }
}

fn collect_leaves<'a>(
    children: &'a BTreeMap<String, ParameterNode>,
    prefix: &ParamPath,
    out: &mut Vec<(ParamPath, &'a LeafNode)>,
) {
    for (name, node) in children {
        let path = prefix.child(name);
        match node {
            ParameterNode::Internal(map) => collect_leaves(map, &path, out),
            ParameterNode::Leaf(leaf) => out.push((path, leaf)),
        }
    }
}
