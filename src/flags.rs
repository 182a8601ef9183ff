use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;

use crate::config::document::kind_of;

/// A value that ends up on the restic command line.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlagValueError {
    #[error("nested maps are not valid flag values")]
    NestedMap,
    #[error("list items must be scalars, got '{0}'")]
    NestedList(&'static str),
}

impl FlagValue {
    /// Values to emit for this flag, `None` when the flag is suppressed.
    ///
    /// An empty vector means a presence-only flag.
    pub fn to_values(&self) -> Option<Vec<String>> {
        match self {
            FlagValue::Bool(true) => Some(Vec::new()),
            FlagValue::Bool(false) => None,
            FlagValue::Integer(0) => None,
            FlagValue::Integer(n) => Some(vec![n.to_string()]),
            FlagValue::Float(f) if *f == 0.0 => None,
            FlagValue::Float(f) => Some(vec![format_float(*f)]),
            FlagValue::String(s) if s.is_empty() => None,
            FlagValue::String(s) => Some(vec![s.clone()]),
            FlagValue::List(items) if items.is_empty() => None,
            FlagValue::List(items) => Some(items.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::String(s) => Some(s),
            _ => None,
        }
    }
}

// Display gives the shortest representation that parses back to the same f64.
fn format_float(value: f64) -> String {
    format!("{}", value)
}

fn scalar_text(value: &Value) -> Result<String, FlagValueError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(match n.as_f64() {
            Some(f) if n.is_f64() => format_float(f),
            _ => n.to_string(),
        }),
        Value::String(s) => Ok(s.clone()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        other => Err(FlagValueError::NestedList(kind_of(other))),
    }
}

impl TryFrom<Value> for FlagValue {
    type Error = FlagValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(FlagValue::String(String::new())),
            Value::Bool(b) => Ok(FlagValue::Bool(b)),
            Value::Number(n) => Ok(if let Some(i) = n.as_i64() {
                FlagValue::Integer(i)
            } else if n.is_u64() {
                // above i64::MAX: kept verbatim instead of rounding through f64
                FlagValue::String(n.to_string())
            } else {
                FlagValue::Float(n.as_f64().unwrap_or_default())
            }),
            Value::String(s) => Ok(FlagValue::String(s)),
            Value::Sequence(items) => items
                .iter()
                .map(scalar_text)
                .collect::<Result<Vec<_>, _>>()
                .map(FlagValue::List),
            Value::Mapping(_) => Err(FlagValueError::NestedMap),
            Value::Tagged(tagged) => FlagValue::try_from(tagged.value),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::String(value.to_string())
    }
}

impl From<&[String]> for FlagValue {
    fn from(value: &[String]) -> Self {
        FlagValue::List(value.to_vec())
    }
}

impl<'de> Deserialize<'de> for FlagValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        FlagValue::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for FlagValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FlagValue::Bool(b) => serializer.serialize_bool(*b),
            FlagValue::Integer(n) => serializer.serialize_i64(*n),
            FlagValue::Float(f) => serializer.serialize_f64(*f),
            FlagValue::String(s) => serializer.serialize_str(s),
            FlagValue::List(items) => items.serialize(serializer),
        }
    }
}

/// Ordered set of command line flags.
///
/// Names are unique: writing a name again replaces its values and keeps its
/// original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    entries: Vec<(String, Vec<String>)>,
}

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, values: Vec<String>) {
        match self.entries.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, current)) => *current = values,
            None => self.entries.push((name.to_string(), values)),
        }
    }

    /// Adds `value` under `name` unless the value is suppressed.
    pub fn add_value(&mut self, name: &str, value: &FlagValue) {
        if let Some(values) = value.to_values() {
            self.add(name, values);
        }
    }

    pub fn add_string(&mut self, name: &str, value: &str) {
        self.add_value(name, &FlagValue::from(value));
    }

    pub fn add_bool(&mut self, name: &str, value: bool) {
        self.add_value(name, &FlagValue::Bool(value));
    }

    pub fn add_list(&mut self, name: &str, values: &[String]) {
        self.add_value(name, &FlagValue::from(values));
    }

    /// Merges `other` into `self`; `other` wins on collisions.
    pub fn extend(&mut self, other: Flags) {
        for (name, values) in other.entries {
            self.add(&name, values);
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        let index = self.entries.iter().position(|(existing, _)| existing == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Renames a flag in place, dropping any flag already named `to`.
    pub fn rename(&mut self, from: &str, to: &str) {
        if from == to || !self.contains(from) {
            return;
        }
        self.remove(to);
        if let Some((name, _)) = self.entries.iter_mut().find(|(existing, _)| existing == from) {
            *name = to.to_string();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `--name` or `--name=value` argument per value.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (name, values) in &self.entries {
            if values.is_empty() {
                args.push(format!("--{}", name));
            }
            for value in values {
                args.push(format!("--{}={}", name, value));
            }
        }
        args
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_args().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag(yaml: &str) -> FlagValue {
        serde_yaml::from_str(yaml).expect("valid flag value")
    }

    #[test]
    fn suppression_table() {
        assert_eq!(flag("true").to_values(), Some(vec![]));
        assert_eq!(flag("false").to_values(), None);
        assert_eq!(flag("test").to_values(), Some(vec!["test".to_string()]));
        assert_eq!(flag("''").to_values(), None);
        assert_eq!(flag("0").to_values(), None);
        assert_eq!(flag("0.0").to_values(), None);
        assert_eq!(flag("42").to_values(), Some(vec!["42".to_string()]));
        assert_eq!(flag("4.2").to_values(), Some(vec!["4.2".to_string()]));
        assert_eq!(flag("[]").to_values(), None);
        assert_eq!(flag("[1]").to_values(), Some(vec!["1".to_string()]));
        assert_eq!(
            flag("[one, two]").to_values(),
            Some(vec!["one".to_string(), "two".to_string()])
        );
    }

    #[test]
    fn unsigned_above_i64_is_kept_verbatim() {
        let big = flag("18446744073709551615");
        assert_eq!(big.to_values(), Some(vec!["18446744073709551615".to_string()]));
        let list = flag("[18446744073709551615, -1, 2.5]");
        assert_eq!(
            list.to_values(),
            Some(vec![
                "18446744073709551615".to_string(),
                "-1".to_string(),
                "2.5".to_string(),
            ])
        );
    }

    #[test]
    fn float_keeps_shortest_form() {
        assert_eq!(FlagValue::Float(0.1).to_values(), Some(vec!["0.1".into()]));
        assert_eq!(FlagValue::Float(-2.5).to_values(), Some(vec!["-2.5".into()]));
    }

    #[test]
    fn rejects_nested_maps() {
        let err = serde_yaml::from_str::<FlagValue>("{ a: 1 }").unwrap_err();
        assert!(err.to_string().contains("nested maps"));
        let err = serde_yaml::from_str::<FlagValue>("[[1]]").unwrap_err();
        assert!(err.to_string().contains("list items must be scalars"));
    }

    #[test]
    fn later_write_replaces_in_place() {
        let mut flags = Flags::new();
        flags.add_string("repo", "first");
        flags.add_bool("quiet", true);
        flags.add_string("repo", "second");
        assert_eq!(
            flags.to_args(),
            vec!["--repo=second".to_string(), "--quiet".to_string()]
        );
    }

    #[test]
    fn rename_replaces_target() {
        let mut flags = Flags::new();
        flags.add_string("repo", "src");
        flags.add_string("from-repo", "stale");
        flags.rename("repo", "from-repo");
        assert_eq!(flags.len(), 1);
        assert_eq!(flags.get("from-repo"), Some(&["src".to_string()][..]));
    }
}
