use std::fmt;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use super::ConfigError;

/// File formats the configuration can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Yaml,
    Json,
}

impl Format {
    /// `.conf` files are TOML.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "toml" | "conf" => Some(Format::Toml),
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_name)
    }

    pub fn extensions() -> &'static [&'static str] {
        &["toml", "conf", "yaml", "yml", "json"]
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Toml => write!(f, "toml"),
            Format::Yaml => write!(f, "yaml"),
            Format::Json => write!(f, "json"),
        }
    }
}

/// The raw configuration tree, whatever format it came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    root: Mapping,
}

impl Document {
    pub fn parse(input: &str, format: Format) -> Result<Self, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse { format, message };
        let value: Value = match format {
            Format::Toml => toml::from_str(input).map_err(|e| parse_error(e.to_string()))?,
            Format::Yaml => serde_yaml::from_str(input).map_err(|e| parse_error(e.to_string()))?,
            Format::Json => serde_json::from_str(input).map_err(|e| parse_error(e.to_string()))?,
        };
        match value {
            Value::Mapping(root) => Ok(Self { root }),
            Value::Null => Ok(Self::default()),
            other => Err(parse_error(format!(
                "expected a map at the root, got '{}'",
                kind_of(&other)
            ))),
        }
    }

    pub fn root(&self) -> &Mapping {
        &self.root
    }

    /// Value at a dot-delimited path such as `profiles.default`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments: Vec<&str> = path.split('.').collect();
        self.section(&segments)
    }

    /// Value under `segments`, each segment taken verbatim.
    pub fn section(&self, segments: &[&str]) -> Option<&Value> {
        let (first, rest) = segments.split_first()?;
        let mut current = self.root.get(*first)?;
        for segment in rest {
            current = current.as_mapping()?.get(*segment)?;
        }
        Some(current)
    }

    /// Keys of the mapping under `segments`; the root when empty.
    pub fn keys(&self, segments: &[&str]) -> Vec<String> {
        let mapping = if segments.is_empty() {
            Some(&self.root)
        } else {
            self.section(segments).and_then(Value::as_mapping)
        };
        mapping
            .map(|m| m.keys().filter_map(key_string).collect())
            .unwrap_or_default()
    }
}

/// Mapping keys as text; numbers and booleans are valid keys in YAML.
pub fn key_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "map",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_tree_from_every_format() {
        let toml = Document::parse("[profile]\nrepository = \"local\"\n", Format::Toml).unwrap();
        let yaml = Document::parse("profile:\n  repository: local\n", Format::Yaml).unwrap();
        let json = Document::parse(r#"{"profile": {"repository": "local"}}"#, Format::Json).unwrap();
        assert_eq!(toml, yaml);
        assert_eq!(yaml, json);
        assert_eq!(
            toml.get("profile.repository"),
            Some(&Value::String("local".into()))
        );
    }

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(Format::from_path(Path::new("profiles.conf")), Some(Format::Toml));
        assert_eq!(Format::from_path(Path::new("a/b.yml")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("profiles.JSON")), Some(Format::Json));
        assert_eq!(Format::from_path(Path::new("profiles.hcl")), None);
    }

    #[test]
    fn empty_yaml_is_an_empty_document() {
        let document = Document::parse("", Format::Yaml).unwrap();
        assert!(document.root().is_empty());
    }

    #[test]
    fn rejects_scalar_root() {
        let err = Document::parse("just text", Format::Yaml).unwrap_err();
        assert!(err.to_string().contains("expected a map at the root"));
    }

    #[test]
    fn profile_names_may_contain_dots() {
        let document = Document::parse("[\"my.profile\"]\nquiet = true\n", Format::Toml).unwrap();
        assert!(document.section(&["my.profile"]).is_some());
        assert!(document.get("my.profile").is_none());
    }
}
