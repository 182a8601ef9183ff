use serde_yaml::{Mapping, Value};

use crate::config::document::{key_string, kind_of};
use crate::config::{Config, ConfigError};

const APPEND_MARKER: &str = "...";

const KEY_INHERIT: &str = "inherit";
const KEY_DESCRIPTION: &str = "description";

/// Merges `name` with its ancestors into one raw mapping.
///
/// The most distant ancestor is applied first. The document itself is left
/// untouched, so resolving the same profile twice gives the same mapping.
pub(crate) fn merge_profile(config: &Config, name: &str) -> Result<Mapping, ConfigError> {
    let chain = inheritance_chain(config, name)?;
    if chain.len() > 1 {
        let parents: Vec<&str> = chain[1..].iter().map(|(parent, _)| parent.as_str()).collect();
        log::debug!("profile '{}' inherits from {:?}", name, parents);
    }

    let mut merged = Mapping::new();
    for (depth, (_, layer)) in chain.iter().rev().enumerate() {
        if depth > 0 {
            merged.remove(KEY_DESCRIPTION);
        }
        merge_layer(&mut merged, layer);
    }
    log::trace!("merged profile '{}': {:?}", name, merged);
    Ok(merged)
}

/// Profile bodies from `name` up to its root ancestor.
fn inheritance_chain(config: &Config, name: &str) -> Result<Vec<(String, Mapping)>, ConfigError> {
    let mut chain: Vec<(String, Mapping)> = Vec::new();
    let mut cursor = Some(name.to_string());
    while let Some(current) = cursor {
        if chain.iter().any(|(existing, _)| *existing == current) {
            return Err(ConfigError::InheritanceLoop(current));
        }
        let body = match config.document().section(&config.profile_path(&current)) {
            Some(Value::Mapping(body)) => body.clone(),
            Some(Value::Null) => Mapping::new(),
            Some(other) => {
                return Err(ConfigError::InvalidProfile {
                    profile: current,
                    found: kind_of(other),
                });
            }
            None if chain.is_empty() => return Err(ConfigError::ProfileNotFound(current)),
            None => {
                let child = chain.last().map(|(child, _)| child.clone()).unwrap_or_default();
                return Err(ConfigError::ParentNotFound {
                    profile: child,
                    parent: current,
                });
            }
        };
        cursor = match body.get(KEY_INHERIT) {
            Some(Value::String(parent)) if !parent.trim().is_empty() => {
                Some(parent.trim().to_string())
            }
            _ => None,
        };
        chain.push((current, body));
    }
    Ok(chain)
}

enum Marker<'a> {
    Append(&'a str),
    Prepend(&'a str),
}

fn marker(key: &str) -> Option<Marker<'_>> {
    if let Some(base) = key.strip_suffix(APPEND_MARKER).filter(|base| !base.is_empty()) {
        return Some(Marker::Append(base));
    }
    key.strip_prefix(APPEND_MARKER)
        .filter(|base| !base.is_empty())
        .map(Marker::Prepend)
}

/// Applies one layer on top of `target`.
///
/// Maps merge key by key, anything else replaces. Within the layer plain keys
/// go first, then `key...` appends to and `...key` prepends to the list
/// accumulated so far.
pub(crate) fn merge_layer(target: &mut Mapping, source: &Mapping) {
    let mut markers = Vec::new();
    for (key, value) in source {
        let marked = key_string(key).and_then(|text| match marker(&text) {
            Some(Marker::Append(base)) => Some((base.to_string(), true)),
            Some(Marker::Prepend(base)) => Some((base.to_string(), false)),
            None => None,
        });
        if let Some((base, append)) = marked {
            markers.push((base, append, value));
            continue;
        }
        match value {
            Value::Mapping(child) => {
                let entry = target
                    .entry(key.clone())
                    .or_insert_with(|| Value::Mapping(Mapping::new()));
                if let Value::Mapping(existing) = entry {
                    merge_layer(existing, child);
                } else {
                    let mut fresh = Mapping::new();
                    merge_layer(&mut fresh, child);
                    *entry = Value::Mapping(fresh);
                }
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }

    for (base, append, value) in markers {
        let key = Value::String(base);
        let mut items = target.remove(&key).map(into_items).unwrap_or_default();
        let extra = into_items(value.clone());
        if append {
            items.extend(extra);
        } else {
            items.splice(0..0, extra);
        }
        target.insert(key, Value::Sequence(items));
    }
}

fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Sequence(items) => items,
        other => vec![other],
    }
}
