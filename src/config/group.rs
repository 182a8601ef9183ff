use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::SchemaVersion;
use super::de::one_or_many;

/// A named list of profiles run together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Group {
    pub description: String,
    #[serde(deserialize_with = "one_or_many")]
    pub profiles: Vec<String>,
    pub continue_on_error: Option<bool>,
}

/// Decodes the `groups` section: plain lists in v1, group objects from v2.
pub(crate) fn decode_groups(
    value: &Value,
    version: SchemaVersion,
) -> Result<BTreeMap<String, Group>, serde_yaml::Error> {
    if version == SchemaVersion::V1 {
        let groups: BTreeMap<String, Vec<String>> = serde_yaml::from_value(value.clone())?;
        return Ok(groups
            .into_iter()
            .map(|(name, profiles)| {
                (
                    name,
                    Group {
                        profiles,
                        ..Group::default()
                    },
                )
            })
            .collect());
    }
    serde_yaml::from_value(value.clone())
}
