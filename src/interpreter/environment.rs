// Variable bindings handed to a translator execution

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

static VARIABLE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\{(?P<braced>[A-Za-z_][A-Za-z0-9_]*)\}|(?P<bare>[A-Za-z_][A-Za-z0-9_]*))")
        .expect("variable reference pattern is valid")
});

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// A value bound to a script variable
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// No value: rendered as the backend's unset statement
    Unset,
    Bool(bool),
    Integer(i64),
    Text(String),
    List(Vec<Value>),
    Set(BTreeSet<String>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short type label used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unset => "unset",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Text(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "mapping",
        }
    }

    /// Plain-text rendering used for command line and pattern substitution.
    ///
    /// Collections are joined with single spaces; `Unset` renders empty.
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Unset => String::new(),
            Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Text(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::to_plain_string)
                .collect::<Vec<_>>()
                .join(" "),
            Value::Set(items) => items.iter().cloned().collect::<Vec<_>>().join(" "),
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| format!("{k}={}", v.to_plain_string()))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<&Path> for Value {
    fn from(value: &Path) -> Self {
        Value::Text(value.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for Value {
    fn from(value: PathBuf) -> Self {
        Value::from(value.as_path())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeSet<String>> for Value {
    fn from(values: BTreeSet<String>) -> Self {
        Value::Set(values)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Unset)
    }
}

/// Ordered variable bindings.
///
/// Iteration follows first insertion; re-binding a name keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Environment {
    entries: Vec<(String, Value)>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any previous value in place
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Builder form of [`Environment::set`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Unbind `name`; later renderings emit nothing for it
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let position = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(position).1)
    }

    /// Bind every entry of `other` in its order, overriding existing names
    pub fn extend(&mut self, other: &Environment) {
        for (name, value) in other.iter() {
            self.set(name, value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace `$name` and `${name}` references with the bound values.
    ///
    /// Unknown references are left untouched.
    pub fn substitute(&self, text: &str) -> String {
        self.substitute_with(text, |_| None)
    }

    /// Like [`Environment::substitute`], consulting `fallback` for unbound names
    pub fn substitute_with<F>(&self, text: &str, fallback: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        VARIABLE_REFERENCE
            .replace_all(text, |caps: &Captures| {
                let name = caps
                    .name("braced")
                    .or_else(|| caps.name("bare"))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                match self.get(name) {
                    Some(value) => value.to_plain_string(),
                    None => fallback(name).unwrap_or_else(|| caps[0].to_string()),
                }
            })
            .into_owned()
    }
}

/// Whether `name` can be used as a variable in every supported backend
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

impl<'a> IntoIterator for &'a Environment {
    type Item = (&'a str, &'a Value);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a Value)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_kept_on_rebind() {
        let mut env = Environment::new();
        env.set("b", 1);
        env.set("a", 2);
        env.set("b", 3);

        let names: Vec<_> = env.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(env.get("b"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_substitute_prefers_longest_identifier() {
        let env = Environment::new()
            .with("out", "/tmp/a.pdf")
            .with("outbasename", "a");

        assert_eq!(env.substitute("$out.bak"), "/tmp/a.pdf.bak");
        assert_eq!(env.substitute("${outbasename}_t.tex"), "a_t.tex");
        assert_eq!(env.substitute("$outbasename.log"), "a.log");
        assert_eq!(env.substitute("$unknown stays"), "$unknown stays");
    }

    #[test]
    fn test_substitute_collections() {
        let env = Environment::new().with("exts", vec![".svg", ".svgz"]);
        assert_eq!(env.substitute("[$exts]"), "[.svg .svgz]");
    }

    #[test]
    fn test_option_converts_to_unset() {
        let env = Environment::new().with("missing", Option::<String>::None);
        assert_eq!(env.get("missing"), Some(&Value::Unset));
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("inexts"));
        assert!(is_valid_identifier("_private2"));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("with-dash"));
    }
}
