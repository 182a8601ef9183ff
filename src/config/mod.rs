pub(crate) mod de;
pub mod document;
mod global;
mod group;
mod schedule;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use directories::ProjectDirs;
use serde::Serialize;
use serde_yaml::Value;
use thiserror::Error;

use crate::cli::{ConfigCommand, OutputFormat};
use crate::issues::{IssueLog, ResolutionIssues};
use crate::profile::{self, Profile};
use crate::registry::{SectionRegistry, default_registry};

pub use document::{Document, Format};
pub use global::Global;
pub use group::Group;
pub use schedule::{ScheduleConfig, ScheduleFields, ScheduleSection};

pub const SECTION_GLOBAL: &str = "global";
pub const SECTION_GROUPS: &str = "groups";
pub const SECTION_PROFILES: &str = "profiles";
pub const SECTION_SCHEDULES: &str = "schedules";
pub const SECTION_INCLUDES: &str = "includes";
pub const PARAMETER_VERSION: &str = "version";

const DEFAULT_CONFIG_BASENAME: &str = "profiles";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("profile '{0}' not found")]
    ProfileNotFound(String),
    #[error("error in profile '{profile}': parent profile '{parent}' not found")]
    ParentNotFound { profile: String, parent: String },
    #[error("profile inheritance loop detected at '{0}'")]
    InheritanceLoop(String),
    #[error("profile '{profile}' must be a map, got '{found}'")]
    InvalidProfile {
        profile: String,
        found: &'static str,
    },
    #[error("cannot decode '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("cannot parse {format} configuration: {message}")]
    Parse { format: Format, message: String },
    #[error("unsupported configuration format for {0:?}")]
    UnsupportedFormat(PathBuf),
    #[error("cannot read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid restic version '{0}'")]
    InvalidVersion(String),
    #[error("group '{0}' not found")]
    GroupNotFound(String),
    #[error("schedule '{0}' not found")]
    ScheduleNotFound(String),
}

impl ConfigError {
    /// The requested profile does not exist; not a configuration problem.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::ProfileNotFound(_))
    }
}

/// Layout of the configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SchemaVersion {
    /// Profiles at the root of the document.
    #[default]
    V1,
    /// Profiles under `profiles.`.
    V2,
}

impl SchemaVersion {
    /// Anything missing or unrecognised is version 1.
    pub fn from_value(value: Option<&Value>) -> Self {
        let number = match value {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        match number {
            Some(n) if n >= 2 => SchemaVersion::V2,
            _ => SchemaVersion::V1,
        }
    }
}

/// Description and configured sections of one profile, for listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileInfo {
    pub description: String,
    pub sections: Vec<String>,
}

/// A loaded configuration document.
#[derive(Debug, Clone)]
pub struct Config {
    config_file: PathBuf,
    document: Document,
    version: SchemaVersion,
    registry: Arc<SectionRegistry>,
    issues: IssueLog,
}

impl Config {
    pub fn load(input: &str, format: Format) -> Result<Self, ConfigError> {
        let document = Document::parse(input, format)?;
        Ok(Self::from_document(document, PathBuf::new()))
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let format =
            Format::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.into()))?;
        log::debug!("loading: {:?}", path);
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.into(),
            source,
        })?;
        let document = Document::parse(&contents, format)?;
        Ok(Self::from_document(document, path.to_path_buf()))
    }

    pub fn from_document(document: Document, config_file: PathBuf) -> Self {
        let version = SchemaVersion::from_value(document.get(PARAMETER_VERSION));
        Self {
            config_file,
            document,
            version,
            registry: default_registry(),
            issues: IssueLog::new(),
        }
    }

    /// Replaces the built-in section table.
    pub fn with_registry(mut self, registry: Arc<SectionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Files in the configuration are relative to the configuration file.
    pub fn root_path(&self) -> PathBuf {
        match self.config_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    pub fn registry(&self) -> &Arc<SectionRegistry> {
        &self.registry
    }

    pub fn issues(&self) -> &IssueLog {
        &self.issues
    }

    pub(crate) fn profile_path<'a>(&self, name: &'a str) -> Vec<&'a str> {
        match self.version {
            SchemaVersion::V1 => vec![name],
            SchemaVersion::V2 => vec![SECTION_PROFILES, name],
        }
    }

    pub fn has_profile(&self, name: &str) -> bool {
        self.document.section(&self.profile_path(name)).is_some()
    }

    fn profiles_root(&self) -> Vec<&'static str> {
        match self.version {
            SchemaVersion::V1 => Vec::new(),
            SchemaVersion::V2 => vec![SECTION_PROFILES],
        }
    }

    pub fn profile_names(&self) -> Vec<String> {
        let reserved = [
            SECTION_GLOBAL,
            SECTION_GROUPS,
            SECTION_INCLUDES,
            PARAMETER_VERSION,
            SECTION_SCHEDULES,
        ];
        let mut names: Vec<String> = self
            .document
            .keys(&self.profiles_root())
            .into_iter()
            .filter(|name| {
                self.version == SchemaVersion::V2 || !reserved.contains(&name.as_str())
            })
            .collect();
        names.sort();
        names
    }

    /// Every profile with its description and the sections it defines.
    pub fn profile_sections(&self) -> BTreeMap<String, ProfileInfo> {
        let mut profiles = BTreeMap::new();
        for name in self.profile_names() {
            let mut info = ProfileInfo::default();
            if let Some(Value::Mapping(values)) = self.document.section(&self.profile_path(&name)) {
                for (key, value) in values {
                    let Some(key) = document::key_string(key) else {
                        continue;
                    };
                    match value {
                        Value::String(description) if key == "description" => {
                            info.description = description.clone();
                        }
                        Value::Mapping(_) => info.sections.push(key),
                        _ => {}
                    }
                }
            }
            info.sections.sort();
            profiles.insert(name, info);
        }
        profiles
    }

    /// Resolves `name` with its inherited profiles.
    ///
    /// Fails with [`ConfigError::ProfileNotFound`] when the profile is not
    /// defined; the returned profile has its relative paths fixed and its
    /// backup sources expanded.
    pub fn get_profile(&self, name: &str) -> Result<Profile, ConfigError> {
        let merged = profile::merge_profile(self, name)?;
        let mut profile = Profile::decode(name, merged, self)?;
        profile.set_root_path(&self.root_path());
        profile.resolve_configuration();
        Ok(profile)
    }

    pub fn global(&self) -> Result<Global, ConfigError> {
        match self.document.get(SECTION_GLOBAL) {
            None | Some(Value::Null) => Ok(Global::default()),
            Some(value) => {
                serde_yaml::from_value(value.clone()).map_err(|source| ConfigError::Decode {
                    key: SECTION_GLOBAL.into(),
                    source,
                })
            }
        }
    }

    /// All groups; empty when the section is missing.
    pub fn profile_groups(&self) -> Result<BTreeMap<String, Group>, ConfigError> {
        match self.document.get(SECTION_GROUPS) {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(value) => group::decode_groups(value, self.version).map_err(|source| {
                ConfigError::Decode {
                    key: SECTION_GROUPS.into(),
                    source,
                }
            }),
        }
    }

    pub fn has_profile_group(&self, name: &str) -> bool {
        self.profile_groups()
            .map(|groups| groups.contains_key(name))
            .unwrap_or(false)
    }

    pub fn profile_group(&self, name: &str) -> Result<Group, ConfigError> {
        self.profile_groups()?
            .remove(name)
            .ok_or_else(|| ConfigError::GroupNotFound(name.to_string()))
    }

    /// Names of the v2 `schedules` entries.
    pub fn schedule_names(&self) -> Vec<String> {
        if self.version < SchemaVersion::V2 {
            return Vec::new();
        }
        let mut names = self.document.keys(&[SECTION_SCHEDULES]);
        names.sort();
        names
    }

    pub fn schedule(&self, name: &str) -> Result<ScheduleSection, ConfigError> {
        if self.version < SchemaVersion::V2 {
            return Err(ConfigError::ScheduleNotFound(name.to_string()));
        }
        let value = self
            .document
            .section(&[SECTION_SCHEDULES, name])
            .ok_or_else(|| ConfigError::ScheduleNotFound(name.to_string()))?;
        let mut schedule: ScheduleSection =
            serde_yaml::from_value(value.clone()).map_err(|source| ConfigError::Decode {
                key: format!("{}.{}", SECTION_SCHEDULES, name),
                source,
            })?;
        schedule.name = name.to_string();
        Ok(schedule)
    }

    /// Reports pending resolution issues once, then forgets them.
    pub fn display_configuration_issues(&self) -> ResolutionIssues {
        self.issues.display()
    }
}

/// Looks for `profiles.<ext>` in the current directory, then in the user
/// configuration directory.
pub fn find_configuration_file(name: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = name {
        return Some(path.to_path_buf());
    }
    let mut locations = vec![PathBuf::from(".")];
    if let Some(dirs) = ProjectDirs::from("", "", "resticprofile") {
        locations.push(dirs.config_dir().to_path_buf());
    }
    for location in locations {
        for extension in Format::extensions() {
            let candidate = location.join(format!("{}.{}", DEFAULT_CONFIG_BASENAME, extension));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

pub fn handle_config(command: ConfigCommand, config: &Config) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show { format } => {
            let global = config.global()?;
            print_encoded(&global, format)?;
        }
        ConfigCommand::Paths => {
            println!("config: {:?}", config.config_file());
            println!("root: {:?}", config.root_path());
            println!("version: {:?}", config.version());
        }
        ConfigCommand::Groups { format } => {
            let groups = config.profile_groups()?;
            match format {
                OutputFormat::Text => {
                    for (name, group) in &groups {
                        println!("{}: {}", name, group.profiles.join(", "));
                        if !group.description.is_empty() {
                            println!("  {}", group.description);
                        }
                    }
                }
                _ => print_encoded(&groups, format)?,
            }
        }
    }
    Ok(())
}

pub(crate) fn print_encoded<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    let encoded = match format {
        OutputFormat::Text | OutputFormat::Yaml => {
            serde_yaml::to_string(value).context("failed to serialize for display")?
        }
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).context("failed to serialize for display")?
        }
    };
    println!("{}", encoded);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(toml: &str) -> Config {
        Config::load(toml, Format::Toml).expect("valid configuration")
    }

    #[test]
    fn version_defaults_to_one() {
        assert_eq!(load("").version(), SchemaVersion::V1);
        assert_eq!(load("version = 1").version(), SchemaVersion::V1);
        assert_eq!(load("version = \"2\"").version(), SchemaVersion::V2);
        assert_eq!(load("version = 2").version(), SchemaVersion::V2);
        assert_eq!(load("version = \"next\"").version(), SchemaVersion::V1);
    }

    #[test]
    fn lists_profiles_with_sections() {
        let config = load(
            r#"
[global]
priority = "low"

[default]
description = "home directory"
repository = "local:/backup"
[default.backup]
source = "/home"
[default.retention]
keep-last = 3

[other]
inherit = "default"
"#,
        );
        assert_eq!(config.profile_names(), vec!["default", "other"]);
        let sections = config.profile_sections();
        assert_eq!(sections["default"].description, "home directory");
        assert_eq!(sections["default"].sections, vec!["backup", "retention"]);
        assert!(sections["other"].sections.is_empty());
    }

    #[test]
    fn profiles_live_under_profiles_in_v2() {
        let config = load(
            r#"
version = 2
[global]
priority = "low"
[profiles.default]
repository = "local:/backup"
"#,
        );
        assert!(config.has_profile("default"));
        assert!(!config.has_profile("global"));
        assert_eq!(config.profile_names(), vec!["default"]);
    }

    #[test]
    fn global_section_has_defaults() {
        let global = load("").global().unwrap();
        assert_eq!(global.default_command, "snapshots");
        assert_eq!(global.priority, "normal");

        let global = load("[global]\npriority = \"low\"\nrestic-version = \"0.14\"\n")
            .global()
            .unwrap();
        assert_eq!(global.priority, "low");
        assert_eq!(global.restic_version, "0.14");
        assert_eq!(global.default_command, "snapshots");
    }

    #[test]
    fn groups_v1_and_v2() {
        let v1 = load("[groups]\nfull = [\"root\", \"src\"]\n");
        assert_eq!(v1.profile_group("full").unwrap().profiles, vec!["root", "src"]);
        assert!(v1.has_profile_group("full"));
        assert!(!v1.has_profile_group("other"));

        let v2 = load(
            "version = 2\n[groups.full]\ndescription = \"everything\"\nprofiles = [\"root\", \"src\"]\n",
        );
        let group = v2.profile_group("full").unwrap();
        assert_eq!(group.description, "everything");
        assert_eq!(group.profiles, vec!["root", "src"]);
        assert!(matches!(
            v2.profile_group("missing"),
            Err(ConfigError::GroupNotFound(_))
        ));
    }

    #[test]
    fn schedules_section_in_v2() {
        let config = load(
            r#"
version = 2
[schedules.nightly]
profiles = "root"
run = "backup"
schedule = "*-*-* 02:00"
lock-wait = "5m"
"#,
        );
        assert_eq!(config.schedule_names(), vec!["nightly"]);
        let schedule = config.schedule("nightly").unwrap();
        assert_eq!(schedule.name, "nightly");
        let descriptor = schedule.schedule_config(config.config_file());
        assert_eq!(descriptor.title, "nightly");
        assert_eq!(descriptor.schedules, vec!["*-*-* 02:00"]);
        assert!(matches!(
            config.schedule("weekly"),
            Err(ConfigError::ScheduleNotFound(_))
        ));
    }

    #[test]
    fn injected_registry_drives_generic_sections() {
        use crate::registry::{SectionInfo, SectionKind};

        let registry = SectionRegistry::new(vec![SectionInfo {
            name: "snapshots",
            kind: SectionKind::Generic,
            schedulable: false,
            supports_host: true,
            monitored: false,
            pseudo: false,
        }]);
        let config = load("[default]\n[default.snapshots]\ncompact = true\n")
            .with_registry(Arc::new(registry));
        let profile = config.get_profile("default").unwrap();
        assert_eq!(profile.other_sections.len(), 1);
        assert!(profile.generic_section("snapshots").is_some());
    }

    #[test]
    fn root_path_follows_config_file() {
        let config = Config::from_document(Document::default(), PathBuf::from("/etc/backup/profiles.toml"));
        assert_eq!(config.root_path(), PathBuf::from("/etc/backup"));
        let config = Config::from_document(Document::default(), PathBuf::from("profiles.toml"));
        assert_eq!(config.root_path(), PathBuf::from("."));
    }

    #[test]
    fn loads_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.yaml");
        fs::write(&path, "default:\n  repository: local:/backup\n").unwrap();
        let config = Config::load_file(&path).unwrap();
        assert!(config.has_profile("default"));
        assert_eq!(config.root_path(), dir.path());

        let unsupported = dir.path().join("profiles.hcl");
        assert!(matches!(
            Config::load_file(&unsupported),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
