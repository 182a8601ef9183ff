use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use semver::Version;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use super::sections::{
    BackupSection, CopySection, GenericSection, InitSection, MonitoringFields, RetentionSection,
    ScheduledSection,
};
use crate::confidential::ConfidentialValue;
use crate::config::de::{one_or_many, verbosity};
use crate::config::document::{key_string, kind_of};
use crate::config::{Config, ConfigError, ScheduleConfig, ScheduleFields, SchemaVersion};
use crate::flags::FlagValue;
use crate::issues::{IssueLog, SectionError};
use crate::registry::{
    SECTION_BACKUP, SECTION_CHECK, SECTION_COPY, SECTION_FORGET, SECTION_INIT, SECTION_PRUNE,
    SECTION_RETENTION, SectionRegistry, default_registry,
};
use crate::restic;

/// Top-level keys holding a map that are not restic commands.
const MAP_FIELDS: &[&str] = &["env"];

/// Everything about a profile that does not come from the document.
#[derive(Debug, Clone)]
pub(crate) struct Runtime {
    pub(crate) restic_version: Option<Version>,
    pub(crate) host: Option<String>,
    pub(crate) schema: SchemaVersion,
    pub(crate) issues: IssueLog,
    pub(crate) registry: Arc<SectionRegistry>,
    pub(crate) config_file: PathBuf,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            restic_version: None,
            host: None,
            schema: SchemaVersion::default(),
            issues: IssueLog::default(),
            registry: default_registry(),
            config_file: PathBuf::new(),
        }
    }
}

impl PartialEq for Runtime {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// A resolved profile: the requested body merged over its ancestors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Profile {
    #[serde(skip)]
    name: String,
    pub description: String,
    pub inherit: String,
    pub initialize: bool,
    pub lock: String,
    pub force_lock: bool,
    #[serde(deserialize_with = "one_or_many")]
    pub run_before: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub run_after: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub run_after_fail: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub run_finally: Vec<String>,
    pub status_file: String,
    pub priority: String,
    pub env: BTreeMap<String, ConfidentialValue>,
    pub cache_dir: String,
    pub cacert: String,
    pub tls_client_cert: String,
    pub repository: ConfidentialValue,
    pub repository_file: String,
    pub password_file: ConfidentialValue,
    pub password_command: ConfidentialValue,
    pub key_hint: ConfidentialValue,
    pub quiet: bool,
    #[serde(deserialize_with = "verbosity")]
    pub verbose: u8,
    pub backup: Option<BackupSection>,
    pub retention: Option<RetentionSection>,
    pub check: Option<ScheduledSection>,
    pub prune: Option<ScheduledSection>,
    pub forget: Option<ScheduledSection>,
    pub copy: Option<CopySection>,
    pub init: Option<InitSection>,
    /// Every generic restic command, `None` when the profile does not define it.
    #[serde(skip)]
    pub other_sections: BTreeMap<String, Option<GenericSection>>,
    #[serde(flatten)]
    pub other_flags: BTreeMap<String, FlagValue>,
    #[serde(skip)]
    pub(crate) runtime: Runtime,
}

impl Profile {
    /// Decodes a merged profile body.
    ///
    /// Generic command sections are split off first: a broken one is
    /// recorded in the issue log and left out, the rest of the profile still
    /// resolves.
    pub(crate) fn decode(name: &str, merged: Mapping, config: &Config) -> Result<Self, ConfigError> {
        let registry = Arc::clone(config.registry());
        let issues = config.issues().clone();

        let mut generic = BTreeMap::new();
        let mut body = Mapping::new();
        for (key, value) in merged {
            let Some(text) = key_string(&key) else {
                continue;
            };
            if registry.is_generic(&text) {
                generic.insert(text, value);
                continue;
            }
            let known_map = registry.contains(&text) || MAP_FIELDS.contains(&text.as_str());
            if !known_map {
                if let Err(err) = FlagValue::try_from(value.clone()) {
                    issues.record_failed_section(&text, SectionError::InvalidValue(err));
                    continue;
                }
            }
            body.insert(key, value);
        }

        let mut profile: Profile =
            serde_yaml::from_value(Value::Mapping(body)).map_err(|source| ConfigError::Decode {
                key: name.to_string(),
                source,
            })?;

        for command in registry.generic_commands() {
            let section = match generic.remove(command) {
                None => None,
                Some(Value::Null) => Some(GenericSection::default()),
                Some(value @ Value::Mapping(_)) => {
                    match serde_yaml::from_value::<GenericSection>(value) {
                        Ok(section) => Some(section),
                        Err(err) => {
                            issues.record_failed_section(
                                command,
                                SectionError::Invalid(err.to_string()),
                            );
                            None
                        }
                    }
                }
                Some(other) => {
                    issues.record_failed_section(command, SectionError::NotAMap(kind_of(&other)));
                    None
                }
            };
            profile.other_sections.insert(command.to_string(), section);
        }

        profile.name = name.to_string();
        profile.runtime = Runtime {
            schema: config.version(),
            issues,
            registry,
            config_file: config.config_file().to_path_buf(),
            ..Runtime::default()
        };
        log::debug!("profile '{}' decoded", name);
        Ok(profile)
    }

    /// The requested profile name, even when the body comes from a parent.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.runtime.schema
    }

    pub fn issues(&self) -> &IssueLog {
        &self.runtime.issues
    }

    pub fn registry(&self) -> &SectionRegistry {
        &self.runtime.registry
    }

    /// Runtime host used for `host = true`. An empty name clears it.
    pub fn set_host(&mut self, host: &str) {
        self.runtime.host = Some(host.trim())
            .filter(|host| !host.is_empty())
            .map(String::from);
    }

    pub fn host(&self) -> Option<&str> {
        self.runtime.host.as_deref()
    }

    /// Effective restic version for version dependent flag names. An empty
    /// string means unknown.
    pub fn set_restic_version(&mut self, version: &str) -> Result<(), ConfigError> {
        self.runtime.restic_version = if version.trim().is_empty() {
            None
        } else {
            Some(restic::parse_version(version)?)
        };
        Ok(())
    }

    pub fn restic_version(&self) -> Option<&Version> {
        self.runtime.restic_version.as_ref()
    }

    pub fn generic_section(&self, command: &str) -> Option<&GenericSection> {
        self.other_sections.get(command).and_then(Option::as_ref)
    }

    /// Names of the sections this profile defines, typed and generic.
    pub fn defined_sections(&self) -> Vec<String> {
        let typed = [
            (SECTION_BACKUP, self.backup.is_some()),
            (SECTION_CHECK, self.check.is_some()),
            (SECTION_COPY, self.copy.is_some()),
            (SECTION_FORGET, self.forget.is_some()),
            (SECTION_INIT, self.init.is_some()),
            (SECTION_PRUNE, self.prune.is_some()),
            (SECTION_RETENTION, self.retention.is_some()),
        ];
        let mut names: Vec<String> = typed
            .iter()
            .filter(|(_, defined)| *defined)
            .map(|(name, _)| name.to_string())
            .chain(
                self.other_sections
                    .iter()
                    .filter(|(_, section)| section.is_some())
                    .map(|(name, _)| name.clone()),
            )
            .collect();
        names.sort();
        names
    }

    pub fn schedule_fields(&self, section: &str) -> Option<&ScheduleFields> {
        match section {
            SECTION_BACKUP => self.backup.as_ref().map(|s| &s.schedule),
            SECTION_CHECK => self.check.as_ref().map(|s| &s.schedule),
            SECTION_COPY => self.copy.as_ref().map(|s| &s.schedule),
            SECTION_FORGET => self.forget.as_ref().map(|s| &s.schedule),
            SECTION_PRUNE => self.prune.as_ref().map(|s| &s.schedule),
            SECTION_RETENTION => self.retention.as_ref().map(|s| &s.schedule),
            _ => None,
        }
    }

    pub fn monitoring(&self, section: &str) -> Option<&MonitoringFields> {
        match section {
            SECTION_BACKUP => self.backup.as_ref().map(|s| &s.monitoring),
            SECTION_CHECK => self.check.as_ref().map(|s| &s.monitoring),
            SECTION_COPY => self.copy.as_ref().map(|s| &s.monitoring),
            SECTION_FORGET => self.forget.as_ref().map(|s| &s.monitoring),
            SECTION_PRUNE => self.prune.as_ref().map(|s| &s.monitoring),
            _ => None,
        }
    }

    pub(crate) fn monitoring_mut(&mut self) -> Vec<&mut MonitoringFields> {
        let mut all = Vec::new();
        if let Some(section) = self.backup.as_mut() {
            all.push(&mut section.monitoring);
        }
        for section in [self.check.as_mut(), self.prune.as_mut(), self.forget.as_mut()]
            .into_iter()
            .flatten()
        {
            all.push(&mut section.monitoring);
        }
        if let Some(section) = self.copy.as_mut() {
            all.push(&mut section.monitoring);
        }
        all
    }

    /// Sections with monitoring hooks configured.
    pub fn monitoring_sections(&self) -> Vec<&'static str> {
        let registry = &self.runtime.registry;
        registry
            .sections()
            .map(|info| info.name)
            .filter(|name| registry.is_monitored(name))
            .filter(|name| self.monitoring(name).is_some_and(|fields| !fields.is_empty()))
            .collect()
    }

    /// One descriptor per scheduled section, titled after the profile.
    pub fn schedules(&self) -> Vec<ScheduleConfig> {
        self.runtime
            .registry
            .schedulable_sections()
            .into_iter()
            .filter_map(|command| {
                let fields = self.schedule_fields(command)?;
                if !fields.is_scheduled() {
                    return None;
                }
                Some(ScheduleConfig::from_fields(
                    &self.name,
                    command,
                    fields,
                    &self.runtime.config_file,
                ))
            })
            .collect()
    }

    /// A schedule on `retention` instead of `forget`.
    pub fn has_deprecated_retention_schedule(&self) -> bool {
        self.retention
            .as_ref()
            .is_some_and(|retention| retention.schedule.is_scheduled())
    }
}
