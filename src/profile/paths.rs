use std::collections::BTreeMap;
use std::env;
use std::path::{Component, Path, PathBuf};

use super::model::Profile;
use super::sections::SourceMatch;
use crate::confidential::ConfidentialValue;
use crate::flags::FlagValue;

/// Flag names whose string values are files.
const PATH_FLAGS: &[&str] = &["password-file", "repository-file"];

const GLOB_CHARACTERS: &[char] = &['*', '?', '['];

impl Profile {
    /// Makes every file setting relative to `root`.
    ///
    /// Absolute and empty values are kept; `~` is the home directory.
    /// Repositories, hosts and backup sources are not touched.
    pub fn set_root_path(&mut self, root: &Path) {
        fix_string(&mut self.lock, root);
        fix_string(&mut self.status_file, root);
        fix_string(&mut self.repository_file, root);
        fix_string(&mut self.cacert, root);
        fix_string(&mut self.tls_client_cert, root);
        fix_confidential(&mut self.password_file, root);
        fix_flag_paths(&mut self.other_flags, root);

        if let Some(backup) = self.backup.as_mut() {
            fix_list(&mut backup.exclude_file, root);
            fix_list(&mut backup.files_from, root);
            fix_flag_paths(&mut backup.other_flags, root);
        }
        if let Some(copy) = self.copy.as_mut() {
            fix_string(&mut copy.repository_file, root);
            fix_confidential(&mut copy.password_file, root);
            fix_flag_paths(&mut copy.other_flags, root);
        }
        if let Some(init) = self.init.as_mut() {
            fix_string(&mut init.from_repository_file, root);
            fix_confidential(&mut init.from_password_file, root);
            fix_flag_paths(&mut init.other_flags, root);
        }
        if let Some(retention) = self.retention.as_mut() {
            fix_flag_paths(&mut retention.other_flags, root);
        }
        for section in [self.check.as_mut(), self.prune.as_mut(), self.forget.as_mut()]
            .into_iter()
            .flatten()
        {
            fix_flag_paths(&mut section.other_flags, root);
        }
        for section in self.other_sections.values_mut().flatten() {
            fix_flag_paths(&mut section.other_flags, root);
        }
        for monitoring in self.monitoring_mut() {
            for send in monitoring.all_mut() {
                fix_string(&mut send.body_template, root);
            }
        }
    }

    /// Expands glob patterns of the backup sources.
    ///
    /// Matches are sorted; a pattern matching nothing is kept as written.
    pub fn resolve_configuration(&mut self) {
        if let Some(backup) = self.backup.as_mut() {
            let matches = backup
                .source
                .iter()
                .map(|pattern| SourceMatch {
                    pattern: pattern.clone(),
                    paths: expand_glob(pattern),
                })
                .collect();
            backup.resolved_source = Some(matches);
        }
    }

    /// Backup sources, expanded when `resolve_configuration` ran.
    pub fn backup_source(&self) -> Vec<String> {
        let Some(backup) = self.backup.as_ref() else {
            return Vec::new();
        };
        match &backup.resolved_source {
            Some(matches) => matches
                .iter()
                .flat_map(|source| source.paths.iter().cloned())
                .collect(),
            None => backup.source.clone(),
        }
    }
}

fn fix_string(value: &mut String, root: &Path) {
    let fixed = fix_path(value, root);
    *value = fixed;
}

fn fix_confidential(value: &mut ConfidentialValue, root: &Path) {
    let fixed = fix_path(value.value(), root);
    value.set_value(fixed);
}

fn fix_list(values: &mut [String], root: &Path) {
    for value in values {
        fix_string(value, root);
    }
}

fn fix_flag_paths(flags: &mut BTreeMap<String, FlagValue>, root: &Path) {
    for name in PATH_FLAGS {
        if let Some(FlagValue::String(value)) = flags.get_mut(*name) {
            fix_string(value, root);
        }
    }
}

/// `value` relative to `root`, unless it is empty or already absolute.
pub fn fix_path(value: &str, root: &Path) -> String {
    if value.is_empty() {
        return String::new();
    }
    if value == "~" || value.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let rest = value.trim_start_matches('~').trim_start_matches('/');
            return path_string(&clean_path(&home.join(rest)));
        }
        return value.to_string();
    }
    let path = Path::new(value);
    if path.is_absolute() {
        return value.to_string();
    }
    path_string(&clean_path(&root.join(path)))
}

/// `value` relative to the current directory.
pub fn absolute_path(value: &str) -> String {
    match env::current_dir() {
        Ok(cwd) => fix_path(value, &cwd),
        Err(err) => {
            log::debug!("cannot read current directory: {}", err);
            value.to_string()
        }
    }
}

/// Removes `.` and resolves `..` without touching the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(cleaned.components().next_back(), Some(Component::Normal(_)))
                    && cleaned.pop();
                if !popped && !cleaned.has_root() {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Sorted matches of `pattern`, or the pattern itself when it matches nothing.
pub fn expand_glob(pattern: &str) -> Vec<String> {
    if !pattern.contains(GLOB_CHARACTERS) {
        return vec![pattern.to_string()];
    }
    let mut matches: Vec<String> = match glob::glob(pattern) {
        Ok(paths) => paths
            .filter_map(|entry| entry.ok())
            .map(|path| path_string(&path))
            .collect(),
        Err(err) => {
            log::debug!("invalid glob pattern '{}': {}", pattern, err);
            Vec::new()
        }
    };
    if matches.is_empty() {
        return vec![pattern.to_string()];
    }
    matches.sort();
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Format};
    use std::fs;

    #[test]
    fn cleans_paths_lexically() {
        assert_eq!(clean_path(Path::new("./a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(clean_path(Path::new("/a/../../b")), PathBuf::from("/b"));
        assert_eq!(clean_path(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(clean_path(Path::new(".")), PathBuf::from("."));
    }

    #[test]
    fn fixes_relative_paths_only() {
        let root = Path::new("/etc/restic");
        assert_eq!(fix_path("key", root), "/etc/restic/key");
        assert_eq!(fix_path("../key", root), "/etc/key");
        assert_eq!(fix_path("/key", root), "/key");
        assert_eq!(fix_path("", root), "");
        assert_eq!(fix_path("key", Path::new(".")), "key");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(fix_path("~/key", root), path_string(&home.join("key")));
        }
    }

    #[test]
    fn set_root_path_rewrites_file_settings() {
        let config = Config::load(
            r#"
[default]
repository = "local:backup"
lock = "default.lock"
status-file = "status.json"
password-file = "key"
repository-file = "/etc/repo"
cacert = "ca.pem"
tls-client-cert = "client.pem"
[default.backup]
source = ["data"]
exclude-file = ["excludes", "/abs/excludes"]
files-from = "list"
[default.backup.send-after]
url = "https://ping"
body-template = "body.tpl"
[default.copy]
password-file = "copy-key"
repository-file = "copy-repo"
[default.init]
from-password-file = "init-key"
[default.snapshots]
password-file = "snap-key"
"#,
            Format::Toml,
        )
        .unwrap();
        let mut profile = config.get_profile("default").unwrap();
        profile.set_root_path(Path::new("/root"));
        assert_eq!(profile.repository.value(), "local:backup");
        assert_eq!(profile.lock, "/root/default.lock");
        assert_eq!(profile.status_file, "/root/status.json");
        assert_eq!(profile.password_file.value(), "/root/key");
        assert_eq!(profile.repository_file, "/etc/repo");
        assert_eq!(profile.cacert, "/root/ca.pem");
        assert_eq!(profile.tls_client_cert, "/root/client.pem");
        let backup = profile.backup.as_ref().unwrap();
        assert_eq!(backup.source, vec!["data"]);
        assert_eq!(backup.exclude_file, vec!["/root/excludes", "/abs/excludes"]);
        assert_eq!(backup.files_from, vec!["/root/list"]);
        assert_eq!(backup.monitoring.send_after[0].body_template, "/root/body.tpl");
        let copy = profile.copy.as_ref().unwrap();
        assert_eq!(copy.password_file.value(), "/root/copy-key");
        assert_eq!(copy.repository_file, "/root/copy-repo");
        let init = profile.init.as_ref().unwrap();
        assert_eq!(init.from_password_file.value(), "/root/init-key");
        let snapshots = profile.generic_section("snapshots").unwrap();
        assert_eq!(
            snapshots.other_flags["password-file"],
            FlagValue::from("/root/snap-key")
        );

        let once = profile.clone();
        profile.set_root_path(Path::new("/root"));
        assert_eq!(profile, once);
    }

    #[test]
    fn expands_source_globs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.txt", "c.log"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let root = dir.path().to_string_lossy().into_owned();
        let toml = format!(
            "[default.backup]\nsource = [\"{root}/*.txt\", \"{root}/none-*\", \"{root}/c.log\"]\n"
        );
        let config = Config::load(&toml, Format::Toml).unwrap();
        let mut profile = config.get_profile("default").unwrap();
        let expected = vec![
            format!("{root}/a.txt"),
            format!("{root}/b.txt"),
            format!("{root}/none-*"),
            format!("{root}/c.log"),
        ];
        assert_eq!(profile.backup_source(), expected);

        profile.resolve_configuration();
        assert_eq!(profile.backup_source(), expected);
        let resolved = profile.backup.as_ref().unwrap().resolved_source.as_ref().unwrap();
        assert_eq!(resolved[0].pattern, format!("{root}/*.txt"));
        assert_eq!(resolved[0].paths.len(), 2);
    }
}
