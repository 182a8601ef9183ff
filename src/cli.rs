use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{Config, handle_config};
use crate::profile::handle_profile;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "resolve restic profiles into command line flags",
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file; `profiles.<ext>` is looked up when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Profile(ProfileArgs),
    Config(ConfigArgs),
}

impl Commands {
    /// Runs the command, then discloses the resolution issues whether it
    /// succeeded or not.
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let result = match self {
            Commands::Profile(args) => handle_profile(args, config),
            Commands::Config(args) => handle_config(args.command, config),
        };
        config.display_configuration_issues();
        result
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Profiles with their description and sections.
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// The resolved profile, confidential values hidden.
    Show(ProfileNameArgs),
    /// Flags restic would receive for a command.
    Flags(ProfileFlagsArgs),
    /// Schedules declared by a profile.
    Schedules(ProfileNameArgs),
}

#[derive(Debug, Args)]
pub struct ProfileNameArgs {
    pub name: String,
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ProfileFlagsArgs {
    pub name: String,
    pub command: String,
    /// Overrides `global.restic-version`.
    #[arg(long)]
    pub restic_version: Option<String>,
    /// Host used for `host = true`; defaults to this machine.
    #[arg(long, conflicts_with = "no_host")]
    pub host: Option<String>,
    #[arg(long)]
    pub no_host: bool,
    /// Flags initializing the copy destination instead.
    #[arg(long)]
    pub copy_initialize: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Show {
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
    Paths,
    Groups {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}
