use serde::{Deserialize, Serialize};

/// Settings of the `global` section, shared by every profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Global {
    pub default_command: String,
    pub initialize: bool,
    pub priority: String,
    pub nice: i32,
    pub ionice: bool,
    pub ionice_class: i32,
    pub ionice_level: i32,
    pub restic_binary: String,
    /// Version used for version dependent flags when restic is not queried.
    pub restic_version: String,
    pub min_memory: u64,
}

impl Default for Global {
    fn default() -> Self {
        Self {
            default_command: "snapshots".into(),
            initialize: false,
            priority: "normal".into(),
            nice: 0,
            ionice: false,
            ionice_class: 2,
            ionice_level: 0,
            restic_binary: String::new(),
            restic_version: String::new(),
            min_memory: 100,
        }
    }
}
