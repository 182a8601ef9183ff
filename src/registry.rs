use std::sync::Arc;

use once_cell::sync::Lazy;

pub const SECTION_BACKUP: &str = "backup";
pub const SECTION_CHECK: &str = "check";
pub const SECTION_COPY: &str = "copy";
pub const SECTION_FORGET: &str = "forget";
pub const SECTION_INIT: &str = "init";
pub const SECTION_PRUNE: &str = "prune";
pub const SECTION_RETENTION: &str = "retention";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Backup,
    Retention,
    Check,
    Prune,
    Forget,
    Copy,
    Init,
    /// No dedicated shape: flags and hooks only.
    Generic,
}

impl SectionKind {
    pub fn is_typed(&self) -> bool {
        !matches!(self, SectionKind::Generic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    pub name: &'static str,
    pub kind: SectionKind,
    pub schedulable: bool,
    pub supports_host: bool,
    pub monitored: bool,
    /// Not a restic command (`retention` feeds `forget`).
    pub pseudo: bool,
}

/// What the configuration knows about every restic command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRegistry {
    sections: Vec<SectionInfo>,
}

pub static DEFAULT_REGISTRY: Lazy<Arc<SectionRegistry>> =
    Lazy::new(|| Arc::new(SectionRegistry::restic()));

/// Shared handle on the built-in table.
pub fn default_registry() -> Arc<SectionRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

const HOST_SECTIONS: &[&str] = &[
    "backup",
    "forget",
    "snapshots",
    "mount",
    "retention",
    "copy",
    "dump",
    "find",
    "ls",
    "restore",
    "stats",
    "tag",
];

const RESTIC_COMMANDS: &[&str] = &[
    "backup",
    "cache",
    "cat",
    "check",
    "copy",
    "diff",
    "dump",
    "find",
    "forget",
    "generate",
    "init",
    "key",
    "list",
    "ls",
    "migrate",
    "mount",
    "prune",
    "rebuild-index",
    "recover",
    "repair",
    "restore",
    "rewrite",
    "self-update",
    "snapshots",
    "stats",
    "tag",
    "unlock",
    "version",
];

impl SectionRegistry {
    pub fn new(sections: Vec<SectionInfo>) -> Self {
        Self { sections }
    }

    /// The restic command table.
    pub fn restic() -> Self {
        let mut sections: Vec<SectionInfo> = RESTIC_COMMANDS
            .iter()
            .map(|&name| {
                let kind = match name {
                    SECTION_BACKUP => SectionKind::Backup,
                    SECTION_CHECK => SectionKind::Check,
                    SECTION_COPY => SectionKind::Copy,
                    SECTION_FORGET => SectionKind::Forget,
                    SECTION_INIT => SectionKind::Init,
                    SECTION_PRUNE => SectionKind::Prune,
                    _ => SectionKind::Generic,
                };
                let scheduled = matches!(
                    kind,
                    SectionKind::Backup
                        | SectionKind::Check
                        | SectionKind::Copy
                        | SectionKind::Forget
                        | SectionKind::Prune
                );
                SectionInfo {
                    name,
                    kind,
                    schedulable: scheduled,
                    supports_host: HOST_SECTIONS.contains(&name),
                    monitored: scheduled,
                    pseudo: false,
                }
            })
            .collect();
        sections.push(SectionInfo {
            name: SECTION_RETENTION,
            kind: SectionKind::Retention,
            schedulable: true,
            supports_host: true,
            monitored: false,
            pseudo: true,
        });
        Self { sections }
    }

    pub fn get(&self, name: &str) -> Option<&SectionInfo> {
        self.sections.iter().find(|info| info.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn sections(&self) -> impl Iterator<Item = &SectionInfo> {
        self.sections.iter()
    }

    /// Restic commands, excluding pseudo sections.
    pub fn command_names(&self) -> Vec<&'static str> {
        self.sections
            .iter()
            .filter(|info| !info.pseudo)
            .map(|info| info.name)
            .collect()
    }

    pub fn generic_commands(&self) -> Vec<&'static str> {
        self.sections
            .iter()
            .filter(|info| !info.kind.is_typed())
            .map(|info| info.name)
            .collect()
    }

    pub fn is_generic(&self, name: &str) -> bool {
        self.get(name).is_some_and(|info| !info.kind.is_typed())
    }

    pub fn supports_host(&self, name: &str) -> bool {
        self.get(name).is_some_and(|info| info.supports_host)
    }

    pub fn is_schedulable(&self, name: &str) -> bool {
        self.get(name).is_some_and(|info| info.schedulable)
    }

    pub fn schedulable_sections(&self) -> Vec<&'static str> {
        self.sections
            .iter()
            .filter(|info| info.schedulable)
            .map(|info| info.name)
            .collect()
    }

    pub fn is_monitored(&self, name: &str) -> bool {
        self.get(name).is_some_and(|info| info.monitored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_sections() {
        let registry = SectionRegistry::restic();
        let typed: Vec<_> = registry
            .sections()
            .filter(|info| info.kind.is_typed())
            .map(|info| info.name)
            .collect();
        assert_eq!(
            typed,
            vec!["backup", "check", "copy", "forget", "init", "prune", "retention"]
        );
        assert!(registry.is_generic("ls"));
        assert!(!registry.is_generic("backup"));
        assert!(!registry.is_generic("unknown"));
    }

    #[test]
    fn schedulable_sections() {
        let registry = default_registry();
        assert_eq!(registry.schedulable_sections().len(), 6);
        assert!(registry.is_schedulable("retention"));
        assert!(!registry.is_schedulable("init"));
    }

    #[test]
    fn host_sections() {
        let registry = default_registry();
        for name in HOST_SECTIONS {
            assert!(registry.supports_host(name), "{}", name);
        }
        assert!(!registry.supports_host("check"));
        assert!(!registry.supports_host("init"));
    }

    #[test]
    fn retention_is_not_a_command() {
        let registry = default_registry();
        assert!(!registry.command_names().contains(&"retention"));
        assert!(registry.command_names().contains(&"snapshots"));
    }
}
