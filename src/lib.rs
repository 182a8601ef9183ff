pub mod cli;
pub mod confidential;
pub mod config;
pub mod flags;
pub mod issues;
pub mod profile;
pub mod registry;
pub mod restic;

pub use confidential::ConfidentialValue;
pub use config::{Config, ConfigError, Format, SchemaVersion};
pub use flags::{FlagValue, Flags};
pub use issues::{IssueLog, ResolutionIssues, SectionError};
pub use profile::Profile;
pub use registry::{SectionRegistry, default_registry};
