//! Typed lookups into loosely-typed status documents
//!
//! Status blocks of OLM and engine resources are read as raw JSON. Every lookup
//! reports whether the field was found, missing, or present with another type,
//! so callers fall back to an explicit Unknown instead of guessing.

use serde_json::Value;

/// Outcome of a field lookup
#[derive(Clone, Debug, PartialEq)]
pub enum Field<T> {
    /// The field exists with the expected type
    Found(T),
    /// The field (or one of its parents) does not exist
    Missing,
    /// The field exists with a different type
    WrongType,
}

impl<T> Field<T> {
    /// The value if found
    pub fn found(self) -> Option<T> {
        match self {
            Field::Found(v) => Some(v),
            _ => None,
        }
    }

    /// The value if found, otherwise `default`
    pub fn or(self, default: T) -> T {
        self.found().unwrap_or(default)
    }
}

/// Walk `path` from `root`, requiring each intermediate to be an object
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Field<&'a Value> {
    let mut current = root;
    for key in path {
        match current {
            Value::Object(map) => match map.get(*key) {
                Some(v) => current = v,
                None => return Field::Missing,
            },
            Value::Null => return Field::Missing,
            _ => return Field::WrongType,
        }
    }
    match current {
        Value::Null => Field::Missing,
        v => Field::Found(v),
    }
}

/// String at `path`
pub fn string<'a>(root: &'a Value, path: &[&str]) -> Field<&'a str> {
    match lookup(root, path) {
        Field::Found(Value::String(s)) => Field::Found(s.as_str()),
        Field::Found(_) | Field::WrongType => Field::WrongType,
        Field::Missing => Field::Missing,
    }
}

/// Array at `path`
pub fn array<'a>(root: &'a Value, path: &[&str]) -> Field<&'a Vec<Value>> {
    match lookup(root, path) {
        Field::Found(Value::Array(a)) => Field::Found(a),
        Field::Found(_) | Field::WrongType => Field::WrongType,
        Field::Missing => Field::Missing,
    }
}

/// Object at `path`
pub fn object<'a>(root: &'a Value, path: &[&str]) -> Field<&'a serde_json::Map<String, Value>> {
    match lookup(root, path) {
        Field::Found(Value::Object(m)) => Field::Found(m),
        Field::Found(_) | Field::WrongType => Field::WrongType,
        Field::Missing => Field::Missing,
    }
}

/// String at `path`, empty when absent or mistyped
pub fn string_or_empty(root: &Value, path: &[&str]) -> String {
    string(root, path).or("").to_string()
}
