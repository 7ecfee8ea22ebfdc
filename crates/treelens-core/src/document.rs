//! Schema-less component documents and path-addressed access.
//!
//! Component state, props and context are JSON [`Value`]s. A [`Document`] is a
//! shared, lockable value: the host framework and the backend's node record
//! hold the same document, so a write through the backend lands in the
//! component's live data.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One segment of a path into a document.
///
/// On the wire a path is a JSON array of numbers and strings. Numeric strings
/// still address array elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathKey {
    Index(usize),
    Field(String),
}

impl PathKey {
    fn as_index(&self) -> Option<usize> {
        match self {
            PathKey::Index(index) => Some(*index),
            PathKey::Field(field) => field.parse().ok(),
        }
    }

    fn as_field(&self) -> String {
        match self {
            PathKey::Index(index) => index.to_string(),
            PathKey::Field(field) => field.clone(),
        }
    }
}

impl From<&str> for PathKey {
    fn from(value: &str) -> Self {
        PathKey::Field(value.to_string())
    }
}

impl From<usize> for PathKey {
    fn from(value: usize) -> Self {
        PathKey::Index(value)
    }
}

fn child<'a>(value: &'a Value, key: &PathKey) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(&key.as_field()),
        Value::Array(items) => items.get(key.as_index()?),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, key: &PathKey) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(&key.as_field()),
        Value::Array(items) => items.get_mut(key.as_index()?),
        _ => None,
    }
}

/// Reads the value at `path`, or `None` if any segment is missing.
pub fn get_in<'a>(root: &'a Value, path: &[PathKey]) -> Option<&'a Value> {
    path.iter().try_fold(root, |value, key| child(value, key))
}

/// Assigns `value` at `path`.
///
/// Every segment but the last must resolve to an existing, non-null
/// container; otherwise nothing is written and `false` is returned. An empty
/// path has no final segment and is rejected the same way.
pub fn set_in(root: &mut Value, path: &[PathKey], value: Value) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };

    let mut parent = root;
    for key in parents {
        match child_mut(parent, key) {
            Some(next) if !next.is_null() => parent = next,
            _ => return false,
        }
    }

    match parent {
        Value::Object(map) => {
            map.insert(last.as_field(), value);
            true
        }
        Value::Array(items) => match last.as_index() {
            Some(index) if index < items.len() => {
                items[index] = value;
                true
            }
            Some(index) if index == items.len() => {
                items.push(value);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Reports whether [`set_in`] would write at `path`, without writing.
pub fn can_set_in(root: &Value, path: &[PathKey]) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let parent = parents
        .iter()
        .try_fold(root, |value, key| child(value, key).filter(|next| !next.is_null()));
    match parent {
        Some(Value::Object(_)) => true,
        Some(Value::Array(items)) => last.as_index().is_some_and(|index| index <= items.len()),
        _ => false,
    }
}

/// A shared component document.
#[derive(Clone, Default)]
pub struct Document(Arc<RwLock<Value>>);

impl Document {
    pub fn new(value: Value) -> Self {
        Document(Arc::new(RwLock::new(value)))
    }

    /// Returns a copy of the current value.
    pub fn snapshot(&self) -> Value {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns a copy of the value at `path`.
    pub fn get(&self, path: &[PathKey]) -> Option<Value> {
        let value = self.0.read().unwrap_or_else(PoisonError::into_inner);
        get_in(&value, path).cloned()
    }

    /// Whether a write at `path` would land; see [`can_set_in`].
    pub fn can_set(&self, path: &[PathKey]) -> bool {
        let root = self.0.read().unwrap_or_else(PoisonError::into_inner);
        can_set_in(&root, path)
    }

    /// Writes `value` at `path`; see [`set_in`].
    pub fn set(&self, path: &[PathKey], value: Value) -> bool {
        let mut root = self.0.write().unwrap_or_else(PoisonError::into_inner);
        set_in(&mut root, path, value)
    }

    /// Replaces the whole document.
    pub fn replace(&self, value: Value) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = value;
    }

    /// Returns true if both documents are the same shared value.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Document::new(value)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Document").field(&self.snapshot()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(keys: &[&str]) -> Vec<PathKey> {
        keys.iter().map(|k| PathKey::from(*k)).collect()
    }

    #[test]
    fn set_nested_field() {
        let mut value = json!({"a": {"b": 1}});
        assert!(set_in(&mut value, &path(&["a", "b"]), json!(2)));
        assert_eq!(value, json!({"a": {"b": 2}}));
    }

    #[test]
    fn set_creates_final_field() {
        let mut value = json!({"a": {}});
        assert!(set_in(&mut value, &path(&["a", "fresh"]), json!(true)));
        assert_eq!(value["a"]["fresh"], json!(true));
    }

    #[test]
    fn missing_intermediate_is_a_no_op() {
        let mut value = json!({"a": {"b": 1}});
        let before = value.clone();
        assert!(!set_in(&mut value, &path(&["x", "b"]), json!(2)));
        assert_eq!(value, before);
    }

    #[test]
    fn null_intermediate_is_a_no_op() {
        let mut value = json!({"a": null});
        assert!(!set_in(&mut value, &path(&["a", "b"]), json!(2)));
        assert_eq!(value, json!({"a": null}));
    }

    #[test]
    fn scalar_parent_is_a_no_op() {
        let mut value = json!({"a": 3});
        assert!(!set_in(&mut value, &path(&["a", "b"]), json!(2)));
    }

    #[test]
    fn empty_path_is_rejected() {
        let mut value = json!({"a": 1});
        assert!(!set_in(&mut value, &[], json!(2)));
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn arrays_take_numeric_keys_and_append() {
        let mut value = json!({"items": [1, 2]});
        assert!(set_in(&mut value, &[PathKey::from("items"), PathKey::from(0)], json!(9)));
        assert!(set_in(&mut value, &path(&["items", "2"]), json!(3)));
        assert!(!set_in(&mut value, &[PathKey::from("items"), PathKey::from(7)], json!(0)));
        assert_eq!(value, json!({"items": [9, 2, 3]}));
    }

    #[test]
    fn can_set_agrees_with_set() {
        let value = json!({"a": {"b": 1}, "n": null, "items": [1]});
        let cases: Vec<(Vec<PathKey>, bool)> = vec![
            (path(&["a", "b"]), true),
            (path(&["a", "c"]), true),
            (path(&["missing", "c"]), false),
            (path(&["n", "c"]), false),
            (path(&["a", "b", "c"]), false),
            (vec![PathKey::from("items"), PathKey::from(1)], true),
            (vec![PathKey::from("items"), PathKey::from(2)], false),
            (Vec::new(), false),
        ];
        for (keys, expected) in cases {
            assert_eq!(can_set_in(&value, &keys), expected, "{:?}", keys);
            let mut copy = value.clone();
            assert_eq!(set_in(&mut copy, &keys, json!(0)), expected, "{:?}", keys);
        }
    }

    #[test]
    fn get_in_walks_objects_and_arrays() {
        let value = json!({"todos": [{"done": false}]});
        let done = get_in(&value, &[PathKey::from("todos"), PathKey::from(0), PathKey::from("done")]);
        assert_eq!(done, Some(&json!(false)));
        assert!(get_in(&value, &path(&["missing"])).is_none());
    }

    #[test]
    fn path_keys_deserialize_from_mixed_arrays() {
        let keys: Vec<PathKey> = serde_json::from_str(r#"["todos", 1, "title"]"#).unwrap();
        assert_eq!(
            keys,
            vec![PathKey::from("todos"), PathKey::Index(1), PathKey::from("title")]
        );
    }

    #[test]
    fn documents_share_writes() {
        let doc = Document::new(json!({"count": 0}));
        let shared = doc.clone();
        assert!(shared.set(&path(&["count"]), json!(5)));
        assert_eq!(doc.get(&path(&["count"])), Some(json!(5)));
        assert!(doc.ptr_eq(&shared));
    }
}
