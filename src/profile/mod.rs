mod flags;
mod model;
mod paths;
mod resolver;
mod sections;

use anyhow::{Context, Result};
use serde_yaml::Value;

use crate::cli::{OutputFormat, ProfileArgs, ProfileCommand, ProfileFlagsArgs, ProfileNameArgs};
use crate::config::{Config, print_encoded};

pub use model::Profile;
pub use paths::{absolute_path, clean_path, expand_glob, fix_path};
pub(crate) use resolver::merge_profile;
pub use sections::{
    BackupSection, CopySection, GenericSection, InitSection, ListOption, MonitoringFields,
    RetentionSection, ScheduledSection, SendHeader, SendMonitoring, SourceMatch,
};

pub fn handle_profile(args: ProfileArgs, config: &Config) -> Result<()> {
    match args.command {
        ProfileCommand::List { format } => {
            let profiles = config.profile_sections();
            match format {
                OutputFormat::Text => {
                    for (name, info) in &profiles {
                        if info.description.is_empty() {
                            println!("{}", name);
                        } else {
                            println!("{}: {}", name, info.description);
                        }
                        if !info.sections.is_empty() {
                            println!("  ({})", info.sections.join(", "));
                        }
                    }
                }
                _ => print_encoded(&profiles, format)?,
            }
        }
        ProfileCommand::Show(ProfileNameArgs { name, format }) => {
            let profile = load_profile(config, &name)?;
            print_encoded(&show_value(&profile)?, format)?;
        }
        ProfileCommand::Flags(args) => {
            let profile = prepare_profile(config, &args)?;
            let flags = if args.copy_initialize {
                profile
                    .get_copy_initialize_flags()
                    .with_context(|| format!("profile '{}' has no copy section", args.name))?
            } else {
                profile.get_command_flags(&args.command)
            };
            let mut line = flags.to_args();
            if !args.copy_initialize && args.command == "backup" {
                line.extend(profile.backup_source());
            }
            println!("{}", line.join(" "));
        }
        ProfileCommand::Schedules(ProfileNameArgs { name, format }) => {
            let profile = load_profile(config, &name)?;
            if profile.has_deprecated_retention_schedule() {
                log::warn!(
                    "profile '{}': scheduling the retention section is deprecated, use forget instead",
                    name
                );
            }
            let mut schedules = profile.schedules();
            for schedule_name in config.schedule_names() {
                let schedule = config.schedule(&schedule_name)?;
                if schedule.profiles.iter().any(|member| *member == name) {
                    schedules.push(schedule.schedule_config(config.config_file()));
                }
            }
            print_encoded(&schedules, format)?;
        }
    }
    Ok(())
}

fn load_profile(config: &Config, name: &str) -> Result<Profile> {
    config
        .get_profile(name)
        .with_context(|| format!("cannot load profile '{}'", name))
}

fn prepare_profile(config: &Config, args: &ProfileFlagsArgs) -> Result<Profile> {
    let mut profile = load_profile(config, &args.name)?;
    let version = match &args.restic_version {
        Some(version) => version.clone(),
        None => config.global()?.restic_version,
    };
    profile
        .set_restic_version(&version)
        .context("invalid restic version")?;
    if !args.no_host {
        let host = match &args.host {
            Some(host) => host.clone(),
            None => hostname::get()
                .context("cannot read the host name")?
                .to_string_lossy()
                .into_owned(),
        };
        profile.set_host(&host);
    }
    Ok(profile)
}

/// The profile as a document, with its generic sections included.
fn show_value(profile: &Profile) -> Result<Value> {
    let mut value = serde_yaml::to_value(profile).context("failed to serialize profile")?;
    if let Value::Mapping(mapping) = &mut value {
        for (name, section) in &profile.other_sections {
            if let Some(section) = section {
                let section =
                    serde_yaml::to_value(section).context("failed to serialize section")?;
                mapping.insert(Value::String(name.clone()), section);
            }
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Format;

    #[test]
    fn show_includes_generic_sections_and_hides_secrets() {
        let config = Config::load(
            "[default]\nrepository = \"s3:secret\"\n[default.snapshots]\ncompact = true\n",
            Format::Toml,
        )
        .unwrap();
        let profile = config.get_profile("default").unwrap();
        let value = show_value(&profile).unwrap();
        let text = serde_yaml::to_string(&value).unwrap();
        assert!(text.contains("snapshots"));
        assert!(text.contains("compact: true"));
        assert!(!text.contains("s3:secret"));
        assert!(!text.contains("\nls:"));
    }
}
