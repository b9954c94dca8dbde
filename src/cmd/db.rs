//! Local ideas database commands: `init-db`, `show`, `list`.

use std::path::Path;

use anyhow::Result;
use ideaworks::errors::WorkflowError;
use ideaworks::store::IdeaStore;
use ideaworks_common::{IdeaStatus, parse_idea_id};
use tracing::info;

use super::{load_config, open_store, print_json};

pub fn cmd_init_db(project_dir: &Path) -> Result<()> {
    let config = load_config(project_dir)?;
    open_store(&config)?;
    info!(path = %config.db_path().display(), "Ideas database ready");
    println!("Initialized ideas database at {}", config.db_path().display());
    Ok(())
}

pub async fn cmd_show(project_dir: &Path, idea_id: &str) -> Result<()> {
    let config = load_config(project_dir)?;
    let store = open_store(&config)?;
    let idea_ref = parse_idea_id(idea_id).map_err(WorkflowError::from)?;
    let idea = store
        .find(&idea_ref.author_id, &idea_ref.slug)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("idea {idea_ref} not found")))?;
    print_json(&idea)
}

pub async fn cmd_list(project_dir: &Path, status: Option<IdeaStatus>) -> Result<()> {
    let config = load_config(project_dir)?;
    let store = open_store(&config)?;
    let ideas = store.call(move |db| db.list_ideas(status)).await?;
    print_json(&ideas)
}
