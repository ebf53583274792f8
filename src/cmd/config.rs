//! `changes-dash config`: view, validate and create dashboard.toml.

use std::path::Path;

use anyhow::{Context, Result};

use changes_dash::config::{API_URL_ENV, DashConfig, PHABRICATOR_HOST_ENV};

use super::super::ConfigCommands;

pub fn cmd_config(config_path: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Changes Dashboard Configuration");
            println!("===============================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No dashboard.toml found at {}; using defaults.", config_path.display());
            }
            for var in [API_URL_ENV, PHABRICATOR_HOST_ENV] {
                if std::env::var(var).is_ok_and(|v| !v.is_empty()) {
                    println!("Override from environment: {}", var);
                }
            }
            println!();

            let config = DashConfig::resolve(Some(config_path))?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{}", rendered.trim_end());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No dashboard.toml found. Using defaults (valid).");
                return Ok(());
            }

            let config = DashConfig::load(config_path)?;
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("dashboard.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            DashConfig::default().save(config_path)?;

            println!("Created dashboard.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [api] base_url, timeout_secs");
            println!("  - [pusher] poll_interval_secs, per_page");
            println!("  - [links] phabricator_host");
            println!("  - [server] host, port");
            println!("  - [logging] level, format, dir");
            println!();
        }
    }

    Ok(())
}
