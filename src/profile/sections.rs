use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;

use crate::confidential::ConfidentialValue;
use crate::config::ScheduleFields;
use crate::config::de::one_or_many;
use crate::config::document::kind_of;
use crate::flags::FlagValue;

/// Section of a restic command without a dedicated shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GenericSection {
    #[serde(deserialize_with = "one_or_many")]
    pub run_before: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub run_after: Vec<String>,
    #[serde(flatten)]
    pub other_flags: BTreeMap<String, FlagValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SendHeader {
    pub name: String,
    pub value: ConfidentialValue,
}

/// One HTTP call made around a command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SendMonitoring {
    pub method: String,
    pub url: ConfidentialValue,
    pub headers: Vec<SendHeader>,
    pub body: String,
    pub body_template: String,
    pub skip_tls_verification: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MonitoringFields {
    #[serde(deserialize_with = "one_or_many")]
    pub send_before: Vec<SendMonitoring>,
    #[serde(deserialize_with = "one_or_many")]
    pub send_after: Vec<SendMonitoring>,
    #[serde(deserialize_with = "one_or_many")]
    pub send_after_fail: Vec<SendMonitoring>,
    #[serde(deserialize_with = "one_or_many")]
    pub send_finally: Vec<SendMonitoring>,
}

impl MonitoringFields {
    pub fn all(&self) -> impl Iterator<Item = &SendMonitoring> {
        self.send_before
            .iter()
            .chain(&self.send_after)
            .chain(&self.send_after_fail)
            .chain(&self.send_finally)
    }

    pub(crate) fn all_mut(&mut self) -> impl Iterator<Item = &mut SendMonitoring> {
        self.send_before
            .iter_mut()
            .chain(&mut self.send_after)
            .chain(&mut self.send_after_fail)
            .chain(&mut self.send_finally)
    }

    pub fn is_empty(&self) -> bool {
        self.all().next().is_none()
    }
}

/// `check`, `prune` and `forget`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScheduledSection {
    #[serde(flatten)]
    pub schedule: ScheduleFields,
    #[serde(flatten)]
    pub monitoring: MonitoringFields,
    #[serde(flatten)]
    pub other_flags: BTreeMap<String, FlagValue>,
}

/// A backup source pattern with the paths it matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceMatch {
    pub pattern: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BackupSection {
    pub check_before: bool,
    pub check_after: bool,
    #[serde(deserialize_with = "one_or_many")]
    pub run_before: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub run_after: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub run_after_fail: Vec<String>,
    #[serde(rename = "stdin")]
    pub use_stdin: bool,
    #[serde(deserialize_with = "one_or_many")]
    pub stdin_command: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub source: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub exclude: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub iexclude: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub exclude_file: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub files_from: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub tag: Vec<String>,
    /// Sources after glob expansion, filled by `resolve_configuration`.
    #[serde(skip)]
    pub resolved_source: Option<Vec<SourceMatch>>,
    #[serde(flatten)]
    pub schedule: ScheduleFields,
    #[serde(flatten)]
    pub monitoring: MonitoringFields,
    #[serde(flatten)]
    pub other_flags: BTreeMap<String, FlagValue>,
}

/// `path` or `tag` of the retention section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ListOption {
    /// Not configured.
    #[default]
    Unset,
    /// `true`: take the values from the backup section.
    FromBackup,
    /// `false`: no flag at all.
    Disabled,
    Values(Vec<String>),
}

impl<'de> Deserialize<'de> for ListOption {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(ListOption::Unset),
            Value::Bool(true) => Ok(ListOption::FromBackup),
            Value::Bool(false) => Ok(ListOption::Disabled),
            Value::String(s) if s.is_empty() => Ok(ListOption::Unset),
            Value::String(s) => Ok(ListOption::Values(vec![s])),
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    Value::Number(n) => Ok(n.to_string()),
                    other => Err(serde::de::Error::custom(format!(
                        "expected a string, got '{}'",
                        kind_of(&other)
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ListOption::Values),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean or a list, got '{}'",
                kind_of(&other)
            ))),
        }
    }
}

impl Serialize for ListOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ListOption::Unset => serializer.serialize_none(),
            ListOption::FromBackup => serializer.serialize_bool(true),
            ListOption::Disabled => serializer.serialize_bool(false),
            ListOption::Values(values) => values.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetentionSection {
    pub before_backup: bool,
    pub after_backup: bool,
    pub path: ListOption,
    pub tag: ListOption,
    /// Scheduling retention on its own is deprecated in favour of `forget`.
    #[serde(flatten)]
    pub schedule: ScheduleFields,
    #[serde(flatten)]
    pub other_flags: BTreeMap<String, FlagValue>,
}

/// Destination of the `copy` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CopySection {
    pub initialize: bool,
    pub repository: ConfidentialValue,
    pub repository_file: String,
    pub password_file: ConfidentialValue,
    pub password_command: ConfidentialValue,
    pub key_hint: ConfidentialValue,
    #[serde(flatten)]
    pub schedule: ScheduleFields,
    #[serde(flatten)]
    pub monitoring: MonitoringFields,
    #[serde(flatten)]
    pub other_flags: BTreeMap<String, FlagValue>,
}

/// Source repository given to `init`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InitSection {
    pub from_repository: ConfidentialValue,
    pub from_repository_file: String,
    pub from_password_file: ConfidentialValue,
    pub from_password_command: ConfidentialValue,
    pub from_key_hint: ConfidentialValue,
    pub copy_chunker_params: bool,
    #[serde(flatten)]
    pub other_flags: BTreeMap<String, FlagValue>,
}
