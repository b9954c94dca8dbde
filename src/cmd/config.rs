//! Configuration view and validation commands: `ideaworks config`.

use std::path::Path;

use anyhow::Result;
use ideaworks::config::{CONFIG_FILE, IdeaworksToml};

use super::super::ConfigCommands;
use super::load_config;

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let config = load_config(project_dir)?;
    let config_path = config.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Ideaworks Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No {} found at {}", CONFIG_FILE, config_path.display());
                println!("Run 'ideaworks config init' to create one.");
            }
            println!();

            let github = &config.toml.github;
            println!("Effective values (with env overrides):");
            println!("[github]");
            println!("  owner = {}", github.owner.as_deref().unwrap_or("(unset)"));
            println!("  repo = {}", github.repo.as_deref().unwrap_or("(unset)"));
            println!("  base = \"{}\"", github.base);
            println!("  api_url = \"{}\"", github.api_url);
            println!("  retries = {}", github.retries);
            println!("  timeout_secs = {}", github.timeout_secs);
            println!(
                "  token = {}",
                if config.has_token() { "(set)" } else { "(unset)" }
            );
            println!();
            println!("[store]");
            println!("  db_path = \"{}\"", config.db_path().display());
            println!();
            println!("[limits]");
            println!("  claim_per_minute = {}", config.toml.limits.claim_per_minute);
            println!(
                "  publish_per_minute = {}",
                config.toml.limits.publish_per_minute
            );
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

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
                println!("{} already exists at {}", CONFIG_FILE, config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !config.config_dir.exists() {
                std::fs::create_dir_all(&config.config_dir)?;
            }

            IdeaworksToml::default().save(&config_path)?;

            println!("Created {} at {}", CONFIG_FILE, config_path.display());
            println!();
            println!("You can now set:");
            println!("  - [github] owner, repo, base");
            println!("  - [limits] claim_per_minute, publish_per_minute");
            println!("GITHUB_TOKEN is read from the environment or .env only.");
            println!();
        }
    }

    Ok(())
}
