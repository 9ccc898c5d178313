//! Heterogeneous attribute value, used for IR node `attrs` maps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A dynamically-typed attribute value. IR nodes carry a bag of these under
/// `attrs` since different `kind`s need different side-tables (callee ids,
/// import names, literal hashes, tags, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Ordered string list stored as `Value::List(Value::Str(..))`, used for
/// the `tags` attribute. Kept order-stable (not a set) so re-scans produce
/// byte-identical serialized output.
pub fn push_unique_tag(attrs: &mut BTreeMap<String, Value>, tag: &str) {
    let entry = attrs.entry("tags".to_string()).or_insert_with(|| Value::List(Vec::new()));
    if let Value::List(items) = entry {
        if !items.iter().any(|v| v.as_str() == Some(tag)) {
            items.push(Value::Str(tag.to_string()));
        }
    } else {
        *entry = Value::List(vec![Value::Str(tag.to_string())]);
    }
}

pub fn has_tag(attrs: &BTreeMap<String, Value>, tag: &str) -> bool {
    attrs
        .get("tags")
        .and_then(Value::as_list)
        .map(|items| items.iter().any(|v| v.as_str() == Some(tag)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_unique_tag_dedupes() {
        let mut attrs = BTreeMap::new();
        push_unique_tag(&mut attrs, "dynamic");
        push_unique_tag(&mut attrs, "unscannable");
        push_unique_tag(&mut attrs, "dynamic");
        let tags = attrs.get("tags").and_then(Value::as_list).unwrap();
        assert_eq!(tags.len(), 2);
        assert!(has_tag(&attrs, "dynamic"));
        assert!(has_tag(&attrs, "unscannable"));
        assert!(!has_tag(&attrs, "sink"));
    }
}
