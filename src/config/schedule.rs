use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::de::{one_or_many, optional_duration, serialize_duration};

/// Scheduling options carried by schedulable profile sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScheduleFields {
    #[serde(deserialize_with = "one_or_many")]
    pub schedule: Vec<String>,
    pub schedule_permission: String,
    pub schedule_log: String,
    pub schedule_priority: String,
    pub schedule_lock_mode: String,
    #[serde(
        deserialize_with = "optional_duration",
        serialize_with = "serialize_duration"
    )]
    pub schedule_lock_wait: Option<Duration>,
}

impl ScheduleFields {
    pub fn is_scheduled(&self) -> bool {
        !self.schedule.is_empty()
    }
}

/// An entry of the v2 `schedules` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScheduleSection {
    #[serde(skip)]
    pub name: String,
    pub group: String,
    #[serde(deserialize_with = "one_or_many")]
    pub profiles: Vec<String>,
    #[serde(rename = "run")]
    pub command: String,
    #[serde(deserialize_with = "one_or_many")]
    pub schedule: Vec<String>,
    pub permission: String,
    pub log: String,
    pub priority: String,
    pub lock_mode: String,
    #[serde(
        deserialize_with = "optional_duration",
        serialize_with = "serialize_duration"
    )]
    pub lock_wait: Option<Duration>,
}

/// What the scheduler needs to register one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScheduleConfig {
    pub title: String,
    pub sub_title: String,
    pub schedules: Vec<String>,
    pub permission: String,
    pub log: String,
    pub priority: String,
    pub lock_mode: String,
    #[serde(serialize_with = "serialize_duration")]
    pub lock_wait: Option<Duration>,
    pub config_file: PathBuf,
}

impl ScheduleConfig {
    pub(crate) fn from_fields(
        title: &str,
        sub_title: &str,
        fields: &ScheduleFields,
        config_file: &Path,
    ) -> Self {
        Self {
            title: title.to_string(),
            sub_title: sub_title.to_string(),
            schedules: fields.schedule.clone(),
            permission: fields.schedule_permission.clone(),
            log: fields.schedule_log.clone(),
            priority: fields.schedule_priority.clone(),
            lock_mode: fields.schedule_lock_mode.clone(),
            lock_wait: fields.schedule_lock_wait,
            config_file: config_file.to_path_buf(),
        }
    }
}

impl ScheduleSection {
    /// Unnamed entries are titled after their first profile and the command.
    pub fn schedule_config(&self, config_file: &Path) -> ScheduleConfig {
        let mut title = self.name.clone();
        let mut sub_title = String::new();
        if title.is_empty() {
            title = self.profiles.first().cloned().unwrap_or_default();
            sub_title = self.command.clone();
        }
        ScheduleConfig {
            title,
            sub_title,
            schedules: self.schedule.clone(),
            permission: self.permission.clone(),
            log: self.log.clone(),
            priority: self.priority.clone(),
            lock_mode: self.lock_mode.clone(),
            lock_wait: self.lock_wait,
            config_file: config_file.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_schedule_uses_its_name() {
        let section = ScheduleSection {
            name: "nightly".into(),
            profiles: vec!["home".into()],
            command: "backup".into(),
            schedule: vec!["daily".into()],
            ..ScheduleSection::default()
        };
        let config = section.schedule_config(Path::new("profiles.toml"));
        assert_eq!(config.title, "nightly");
        assert_eq!(config.sub_title, "");
        assert_eq!(config.schedules, vec!["daily"]);
    }

    #[test]
    fn unnamed_schedule_uses_first_profile_and_command() {
        let section: ScheduleSection = serde_yaml::from_str(
            "profiles: [home, work]\nrun: check\nschedule: weekly\nlock-wait: 10m\n",
        )
        .unwrap();
        let config = section.schedule_config(Path::new("profiles.toml"));
        assert_eq!(config.title, "home");
        assert_eq!(config.sub_title, "check");
        assert_eq!(config.lock_wait, Some(Duration::from_secs(600)));
        assert_eq!(config.config_file, PathBuf::from("profiles.toml"));
    }
}
