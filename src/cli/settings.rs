//! `config get` / `config set`.

use super::Context;
use crate::config::{ConfigKey, ConfigValue};
use crate::error::Result;
use clap::Subcommand;
use std::collections::BTreeMap;

/// `config` subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print one value, or every settable key when none is given
    Get { key: Option<ConfigKey> },
    /// Set a value and write the config file
    Set { key: ConfigKey, value: String },
}

pub fn run_config(cmd: &ConfigCommand, ctx: &mut Context) -> Result<()> {
    match cmd {
        ConfigCommand::Get { key: Some(key) } => {
            let value = key.get(&ctx.config);
            ctx.emit(&value, |v| format!("{}\n", v))
        }
        ConfigCommand::Get { key: None } => {
            let values: BTreeMap<&str, ConfigValue> = ConfigKey::ALL
                .iter()
                .map(|key| (key.name(), key.get(&ctx.config)))
                .collect();
            ctx.emit(&values, |values| {
                values
                    .iter()
                    .map(|(name, value)| format!("{} = {}\n", name, value))
                    .collect()
            })
        }
        ConfigCommand::Set { key, value } => {
            key.set(&mut ctx.config, value)?;
            ctx.config.save(&ctx.config_path)?;
            tracing::info!(key = %key, path = %ctx.config_path.display(), "Updated config");
            let value = key.get(&ctx.config);
            ctx.emit(&value, |v| format!("{} = {}\n", key, v))
        }
    }
}
