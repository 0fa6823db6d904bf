//! Core types for addressing device parameters.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Ordered key sequence addressing one location in a device namespace.
///
/// The empty path addresses the namespace root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamPath(Vec<String>);

impl ParamPath {
    pub fn root() -> Self {
        ParamPath(Vec::new())
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamPath(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a `/` or `.` separated path, e.g. `audio/out/level`.
    pub fn parse(text: &str) -> Result<Self, ApiError> {
        let segments: Vec<String> = text
            .split(|c| c == '/' || c == '.')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.is_empty() {
            return Err(ApiError::InvalidPath(text.to_string()));
        }
        Ok(ParamPath(segments))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        ParamPath(segments)
    }

    /// Nest `leaf` under every segment: `[a, b]` with `v` becomes `{"a":{"b":v}}`.
    ///
    /// The root path returns `leaf` unchanged.
    pub fn wrap(&self, leaf: Value) -> Value {
        self.0.iter().rev().fold(leaf, |inner, key| {
            let mut map = Map::new();
            map.insert(key.clone(), inner);
            Value::Object(map)
        })
    }

    /// Follow this path into a nested document. `None` if any segment is missing.
    pub fn lookup<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(document, |current, key| current.as_object()?.get(key))
    }

    /// Recover the path and value addressed by a single-leaf document.
    ///
    /// Descends while each level holds exactly one key; the first value that
    /// is not such an object is the leaf value. A one-key object value cannot
    /// be told apart from more path here, use [`ParameterTree::locate`] when
    /// a schema is at hand.
    ///
    /// [`ParameterTree::locate`]: crate::tree::ParameterTree::locate
    pub fn from_document(document: &Value) -> Result<(ParamPath, Value), ApiError> {
        let mut segments = Vec::new();
        let mut current = document;
        while let Some((key, value)) = current
            .as_object()
            .filter(|map| map.len() == 1)
            .and_then(|map| map.iter().next())
        {
            segments.push(key.clone());
            current = value;
        }
        if segments.is_empty() {
            return Err(ApiError::InvalidPath(document.to_string()));
        }
        Ok((ParamPath(segments), current.clone()))
    }
}

impl fmt::Display for ParamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        write!(f, "{}", self.0.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrap_nests_segments() {
        let path = ParamPath::new(["audio", "out", "level"]);
        assert_eq!(
            path.wrap(json!(-12.5)),
            json!({"audio": {"out": {"level": -12.5}}})
        );
        assert_eq!(ParamPath::root().wrap(Value::Null), Value::Null);
    }

    #[test]
    fn test_lookup_follows_path() {
        let doc = json!({"audio": {"out": {"mute": true}}});
        let path = ParamPath::new(["audio", "out", "mute"]);
        assert_eq!(path.lookup(&doc), Some(&json!(true)));
        assert_eq!(ParamPath::new(["audio", "in"]).lookup(&doc), None);
    }

    #[test]
    fn test_from_document_single_leaf() {
        let (path, value) = ParamPath::from_document(&json!({"a": {"b": 3}})).unwrap();
        assert_eq!(path, ParamPath::new(["a", "b"]));
        assert_eq!(value, json!(3));
    }

    #[test]
    fn test_from_document_keeps_structured_values() {
        let (path, value) = ParamPath::from_document(&json!({"a": {"b": [1, 2]}})).unwrap();
        assert_eq!(path.to_string(), "a/b");
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn test_from_document_stops_at_multi_key_object() {
        let (path, value) = ParamPath::from_document(&json!({"a": {"b": {"x": 1, "y": 2}}})).unwrap();
        assert_eq!(path, ParamPath::new(["a", "b"]));
        assert_eq!(value, json!({"x": 1, "y": 2}));
        let result = ParamPath::from_document(&json!({"a": 1, "b": 2}));
        assert!(matches!(result, Err(ApiError::InvalidPath(_))));
    }

    #[test]
    fn test_parse_accepts_both_separators() {
        assert_eq!(
            ParamPath::parse("audio/out.level").unwrap(),
            ParamPath::new(["audio", "out", "level"])
        );
        assert!(ParamPath::parse("//").is_err());
    }
}
