use std::collections::BTreeMap;

use super::model::Profile;
use super::paths::absolute_path;
use super::sections::{CopySection, ListOption};
use crate::config::SchemaVersion;
use crate::confidential::ConfidentialValue;
use crate::flags::{FlagValue, Flags};
use crate::registry::{SECTION_COPY, SECTION_INIT, SECTION_RETENTION, SectionKind};
use crate::restic;

const FLAG_HOST: &str = "host";
const FLAG_PATH: &str = "path";
const FLAG_TAG: &str = "tag";
const FLAG_COPY_CHUNKER_PARAMS: &str = "copy-chunker-params";

/// Flags naming a repository; the second repository of `init` and `copy`
/// uses them under another name.
const REPOSITORY_FLAGS: [&str; 5] = [
    "key-hint",
    "repo",
    "repository-file",
    "password-file",
    "password-command",
];

/// `from-repo` from restic 0.14, `repo2` before.
fn secondary_name(name: &str, from_flags: bool) -> String {
    if from_flags {
        format!("from-{}", name)
    } else {
        format!("{}2", name)
    }
}

impl Profile {
    fn from_flags(&self) -> bool {
        restic::uses_from_flags(self.restic_version())
    }

    /// Flags shared by every command.
    pub fn get_common_flags(&self) -> Flags {
        let mut flags = Flags::new();
        flags.add_string("cache-dir", &self.cache_dir);
        flags.add_string("cacert", &self.cacert);
        flags.add_string("tls-client-cert", &self.tls_client_cert);
        self.add_repository_flags(
            &mut flags,
            [
                &self.key_hint,
                &self.repository,
                &ConfidentialValue::new(self.repository_file.as_str()),
                &self.password_file,
                &self.password_command,
            ],
            |name| name.to_string(),
        );
        flags.add_bool("quiet", self.quiet);
        match self.verbose {
            0 => {}
            1 => flags.add("verbose", Vec::new()),
            level => flags.add("verbose", vec![level.to_string()]),
        }
        for (name, value) in &self.other_flags {
            flags.add_value(name, value);
        }
        flags
    }

    fn add_repository_flags(
        &self,
        flags: &mut Flags,
        values: [&ConfidentialValue; 5],
        rename: impl Fn(&str) -> String,
    ) {
        for (&name, value) in REPOSITORY_FLAGS.iter().zip(values) {
            flags.add_string(&rename(name), value.value());
        }
    }

    /// Other flags of a section, with `host = true` bound to the runtime host.
    fn add_section_flags(
        &self,
        flags: &mut Flags,
        section: &str,
        other_flags: &BTreeMap<String, FlagValue>,
    ) {
        let supports_host = self.registry().supports_host(section);
        for (name, value) in other_flags {
            if supports_host && name == FLAG_HOST {
                if let FlagValue::Bool(true) = value {
                    let host = self.host().map(|host| vec![host.to_string()]);
                    flags.add(name, host.unwrap_or_default());
                    continue;
                }
            }
            flags.add_value(name, value);
        }
    }

    /// Common flags followed by the flags of `command`; the command wins on
    /// collisions. Unknown commands only get the common flags.
    pub fn get_command_flags(&self, command: &str) -> Flags {
        let kind = self.registry().get(command).map(|info| info.kind);
        if kind == Some(SectionKind::Retention) {
            return self.get_retention_flags();
        }

        let mut flags = self.get_common_flags();
        match kind {
            Some(SectionKind::Backup) => {
                if let Some(backup) = &self.backup {
                    flags.add_bool("stdin", backup.use_stdin);
                    flags.add_list("exclude", &backup.exclude);
                    flags.add_list("iexclude", &backup.iexclude);
                    flags.add_list("exclude-file", &backup.exclude_file);
                    flags.add_list("files-from", &backup.files_from);
                    flags.add_list("tag", &backup.tag);
                    self.add_section_flags(&mut flags, command, &backup.other_flags);
                }
            }
            Some(SectionKind::Check) | Some(SectionKind::Prune) | Some(SectionKind::Forget) => {
                let section = match kind {
                    Some(SectionKind::Check) => self.check.as_ref(),
                    Some(SectionKind::Prune) => self.prune.as_ref(),
                    _ => self.forget.as_ref(),
                };
                if let Some(section) = section {
                    self.add_section_flags(&mut flags, command, &section.other_flags);
                }
            }
            Some(SectionKind::Copy) => self.add_copy_flags(&mut flags),
            Some(SectionKind::Init) => self.add_init_flags(&mut flags),
            Some(SectionKind::Generic) => {
                if let Some(section) = self.generic_section(command) {
                    self.add_section_flags(&mut flags, command, &section.other_flags);
                }
            }
            Some(SectionKind::Retention) | None => {}
        }
        flags
    }

    fn copy_repository_values(copy: &CopySection) -> [ConfidentialValue; 5] {
        [
            copy.key_hint.clone(),
            copy.repository.clone(),
            ConfidentialValue::new(copy.repository_file.as_str()),
            copy.password_file.clone(),
            copy.password_command.clone(),
        ]
    }

    /// From 0.14 the profile repository is the source (`from-repo`) and the
    /// copy section the plain destination; before, the destination is `repo2`.
    fn add_copy_flags(&self, flags: &mut Flags) {
        let Some(copy) = &self.copy else {
            return;
        };
        let from_flags = self.from_flags();
        if from_flags {
            for name in REPOSITORY_FLAGS {
                flags.rename(name, &secondary_name(name, true));
            }
        }
        let values = Self::copy_repository_values(copy);
        self.add_repository_flags(flags, values.each_ref(), |name| {
            if from_flags {
                name.to_string()
            } else {
                secondary_name(name, false)
            }
        });
        self.add_section_flags(flags, SECTION_COPY, &copy.other_flags);
    }

    fn add_init_flags(&self, flags: &mut Flags) {
        let Some(init) = &self.init else {
            return;
        };
        let from_flags = self.from_flags();
        let values = [
            init.from_key_hint.clone(),
            init.from_repository.clone(),
            ConfidentialValue::new(init.from_repository_file.as_str()),
            init.from_password_file.clone(),
            init.from_password_command.clone(),
        ];
        self.add_repository_flags(flags, values.each_ref(), |name| {
            secondary_name(name, from_flags)
        });
        flags.add_bool(FLAG_COPY_CHUNKER_PARAMS, init.copy_chunker_params);
        self.add_section_flags(flags, SECTION_INIT, &init.other_flags);
    }

    /// Flags to initialize the copy destination: the copy section is the
    /// repository being created and the profile its chunker source.
    pub fn get_copy_initialize_flags(&self) -> Option<Flags> {
        let copy = self.copy.as_ref()?;
        let from_flags = self.from_flags();

        let mut flags = Flags::new();
        let values = Self::copy_repository_values(copy);
        self.add_repository_flags(&mut flags, values.each_ref(), |name| name.to_string());
        self.add_section_flags(&mut flags, SECTION_COPY, &copy.other_flags);

        let mut common = self.get_common_flags();
        for name in REPOSITORY_FLAGS {
            common.rename(name, &secondary_name(name, from_flags));
        }
        flags.extend(common);
        flags.add(FLAG_COPY_CHUNKER_PARAMS, Vec::new());
        Some(flags)
    }

    /// Flags for `forget` run from the retention section.
    ///
    /// `path` and `tag` default to the backup section; every path that had to
    /// be made absolute is recorded as a resolution issue.
    pub fn get_retention_flags(&self) -> Flags {
        let mut flags = self.get_common_flags();
        let Some(retention) = &self.retention else {
            return flags;
        };

        match &retention.path {
            ListOption::Unset | ListOption::FromBackup => {
                let paths = self.retention_paths_from_backup();
                flags.add_list(FLAG_PATH, &paths);
            }
            ListOption::Values(values) => {
                let paths: Vec<String> = values
                    .iter()
                    .map(|literal| {
                        let path = absolute_path(literal);
                        if path != *literal {
                            self.issues()
                                .record_changed_path(format!("path \"{}\"", literal), vec![path.clone()]);
                        }
                        path
                    })
                    .collect();
                flags.add_list(FLAG_PATH, &paths);
            }
            ListOption::Disabled => {}
        }

        let backup_tags = self.backup.as_ref().map(|backup| backup.tag.as_slice());
        match &retention.tag {
            ListOption::FromBackup => flags.add_list(FLAG_TAG, backup_tags.unwrap_or_default()),
            ListOption::Unset if self.schema_version() >= SchemaVersion::V2 => {
                flags.add_list(FLAG_TAG, backup_tags.unwrap_or_default())
            }
            ListOption::Values(values) => flags.add_list(FLAG_TAG, values),
            ListOption::Unset | ListOption::Disabled => {}
        }

        self.add_section_flags(&mut flags, SECTION_RETENTION, &retention.other_flags);
        flags
    }

    fn retention_paths_from_backup(&self) -> Vec<String> {
        let Some(backup) = &self.backup else {
            return Vec::new();
        };
        let sources: Vec<(String, Vec<String>)> = match &backup.resolved_source {
            Some(matches) => matches
                .iter()
                .map(|source| (source.pattern.clone(), source.paths.clone()))
                .collect(),
            None => backup
                .source
                .iter()
                .map(|pattern| (pattern.clone(), vec![pattern.clone()]))
                .collect(),
        };
        let mut paths = Vec::new();
        for (pattern, matched) in sources {
            let absolute: Vec<String> = matched.iter().map(|path| absolute_path(path)).collect();
            if absolute != [pattern.clone()] {
                self.issues().record_changed_path(
                    format!("path (from source) \"{}\"", pattern),
                    absolute.clone(),
                );
            }
            paths.extend(absolute);
        }
        paths
    }
}
