//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module   | Commands handled                   |
//! |----------|------------------------------------|
//! | `db`     | `InitDb`, `Show`, `List`           |
//! | `ideas`  | `Publish`, `Claim`, `Complete`     |
//! | `config` | `Config`                           |
//!
//! Results go to stdout as pretty JSON. Logs and errors go to stderr.

pub mod config;
pub mod db;
pub mod ideas;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ideaworks::config::IdeaworksConfig;
use ideaworks::hosting::{ContentPublisher, GitHubClient};
use ideaworks::store::SqliteIdeaStore;
use serde::Serialize;

pub use config::cmd_config;
pub use db::{cmd_init_db, cmd_list, cmd_show};
pub use ideas::{cmd_claim, cmd_complete, cmd_publish};

fn load_config(project_dir: &Path) -> Result<IdeaworksConfig> {
    IdeaworksConfig::new(project_dir.to_path_buf())
}

fn open_store(config: &IdeaworksConfig) -> Result<Arc<SqliteIdeaStore>> {
    let path = config.db_path();
    let store = SqliteIdeaStore::open(&path)
        .with_context(|| format!("Failed to open ideas database at {}", path.display()))?;
    Ok(Arc::new(store))
}

fn build_publisher(config: &IdeaworksConfig) -> Result<ContentPublisher> {
    let settings = config.github_settings()?;
    let client = GitHubClient::new(settings).context("Failed to build GitHub client")?;
    Ok(ContentPublisher::new(Arc::new(client)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{json}");
    Ok(())
}
