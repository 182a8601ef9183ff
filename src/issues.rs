use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::flags::FlagValueError;

/// Why a section could not be used. Recorded, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SectionError {
    #[error("expected a map, got '{0}'")]
    NotAMap(&'static str),
    #[error("invalid section: {0}")]
    Invalid(String),
    #[error("invalid value: {0}")]
    InvalidValue(#[from] FlagValueError),
}

/// Non-fatal problems found while resolving profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionIssues {
    pub failed_section: BTreeMap<String, SectionError>,
    pub changed_paths: BTreeMap<String, Vec<String>>,
}

impl ResolutionIssues {
    pub fn is_empty(&self) -> bool {
        self.failed_section.is_empty() && self.changed_paths.is_empty()
    }
}

/// Shared handle on the issues of one configuration.
///
/// Equality always holds so that profiles compare on their content only.
#[derive(Debug, Clone, Default)]
pub struct IssueLog {
    inner: Arc<Mutex<ResolutionIssues>>,
}

impl PartialEq for IssueLog {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl IssueLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ResolutionIssues> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_failed_section(&self, section: &str, error: SectionError) {
        log::debug!("cannot parse section '{}': {}", section, error);
        self.lock().failed_section.insert(section.to_string(), error);
    }

    pub fn record_changed_path(&self, description: String, values: Vec<String>) {
        self.lock().changed_paths.insert(description, values);
    }

    /// Copy of the pending issues, without consuming them.
    pub fn snapshot(&self) -> ResolutionIssues {
        self.lock().clone()
    }

    pub fn has_issues(&self) -> bool {
        !self.lock().is_empty()
    }

    /// Logs every pending issue and forgets them.
    pub fn display(&self) -> ResolutionIssues {
        let issues = std::mem::take(&mut *self.lock());
        if !issues.failed_section.is_empty() {
            for (section, error) in &issues.failed_section {
                log::warn!("the configuration section '{}' was ignored: {}", section, error);
            }
        }
        if !issues.changed_paths.is_empty() {
            log::warn!("the retention section uses paths different from the configuration:");
            for (description, values) in &issues.changed_paths {
                log::warn!("  {} => {:?}", description, values);
            }
        }
        issues
    }
}
