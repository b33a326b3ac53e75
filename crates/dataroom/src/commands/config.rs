//! Configuration commands

use anyhow::{Context, Result};
use camino::Utf8Path;
use dataroom_core::StorageConfig;

use super::load_config;
use crate::cli::{ConfigCommands, ConfigShowArgs};
use crate::output;

pub fn run(cmd: ConfigCommands, config: Option<&Utf8Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => show(args, config),
        ConfigCommands::Validate => validate(config),
    }
}

fn show(args: ConfigShowArgs, path: Option<&Utf8Path>) -> Result<()> {
    let config = load_config(path)?;
    let shown = config.redacted();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    output::header("Storage configuration");
    print!("{}", serde_yaml_ng::to_string(&shown)?);
    println!();
    output::kv("Effective region", config.effective_region());
    output::kv("Effective local path", config.effective_local_path().as_str());
    output::kv("Encryption", encryption_mode(&config));
    Ok(())
}

fn validate(path: Option<&Utf8Path>) -> Result<()> {
    let config = load_config(path)?;
    config
        .validate()
        .with_context(|| format!("Invalid {} configuration", config.provider))?;
    output::success(&format!("{} configuration is valid", config.provider));
    if config.encryption_key.is_none() {
        output::warning("No encryption key configured; encrypted operations will fail");
    }
    Ok(())
}

fn encryption_mode(config: &StorageConfig) -> &'static str {
    match config.encryption_key.as_deref() {
        None => "not configured",
        Some(key) => match dataroom_crypto::EnvelopeCrypto::from_secret(key) {
            Ok(service) if service.uses_derived_keys() => "passphrase (derived per-object keys)",
            Ok(_) => "raw key",
            Err(_) => "invalid key",
        },
    }
}
