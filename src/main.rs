use anyhow::{Context, Result};
use clap::Parser;

use resticprofile::{cli, config};

fn main() -> Result<()> {
    env_logger::init();

    let cli = cli::Cli::parse();
    let path = config::find_configuration_file(cli.config.as_deref())
        .context("no configuration file found (profiles.toml, profiles.yaml, profiles.json)")?;
    let config = config::Config::load_file(&path)
        .with_context(|| format!("cannot load configuration {:?}", path))?;

    cli.command.run(&config)
}
