//! Workflow commands: `publish`, `claim`, `complete`.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use ideaworks::errors::WorkflowError;
use ideaworks::ratelimit::TokenBucketLimiter;
use ideaworks::workflow::{
    ClaimInput, ClaimWorkflow, CompleteInput, CompletionWorkflow, PublishIdeaInput,
    PublishIdeaWorkflow, RateLimit,
};
use ideaworks_common::parse_idea_id;

use super::{build_publisher, load_config, open_store, print_json};

pub async fn cmd_publish(project_dir: &Path, input: PublishIdeaInput) -> Result<()> {
    let config = load_config(project_dir)?;
    let store = open_store(&config)?;
    let workflow = PublishIdeaWorkflow::new(store, Arc::new(TokenBucketLimiter::new()))
        .with_rate_limit(RateLimit::per_minute(config.toml.limits.publish_per_minute));
    let idea = workflow.publish(input).await?;
    print_json(&idea)
}

pub async fn cmd_claim(
    project_dir: &Path,
    idea_id: &str,
    implement_author_id: String,
    actor_id: String,
    actor_contact: Option<String>,
    source_ip: String,
) -> Result<()> {
    let idea = parse_idea_id(idea_id).map_err(WorkflowError::from)?;
    let config = load_config(project_dir)?;
    let store = open_store(&config)?;
    let publisher = build_publisher(&config)?;
    let workflow = ClaimWorkflow::new(store, Arc::new(TokenBucketLimiter::new()), publisher)
        .with_rate_limit(RateLimit::per_minute(config.toml.limits.claim_per_minute));

    let output = workflow
        .claim(ClaimInput {
            idea_author_id: idea.author_id,
            idea_slug: idea.slug,
            implement_author_id,
            actor_id,
            actor_contact,
            source_ip,
        })
        .await?;
    print_json(&output)
}

pub async fn cmd_complete(project_dir: &Path, input: CompleteInput) -> Result<()> {
    let config = load_config(project_dir)?;
    let publisher = build_publisher(&config)?;
    let mut workflow = CompletionWorkflow::new(publisher);
    // The local database is optional here; content files decide.
    if config.db_path().exists() {
        workflow = workflow.with_store(open_store(&config)?);
    }
    let output = workflow.complete(input).await?;
    print_json(&output)
}
