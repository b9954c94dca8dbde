use std::sync::Arc;

use ideaworks_common::{
    DemoDescriptor, IdeaPatch, IdeaStatus, WorkMeta, WorkType, normalize_id, normalize_tags,
};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use super::scaffold::{claim_body, iso_date, work_plan};
use super::slug::resolve_work_slug;
use super::{Clock, RateLimit, claim_branch_name, retry_hint, system_clock};
use crate::errors::WorkflowError;
use crate::hosting::{ContentPublisher, PublishRequest, PullRequestDraft};
use crate::ratelimit::RateLimiter;
use crate::store::IdeaStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimInput {
    pub idea_author_id: String,
    pub idea_slug: String,
    pub implement_author_id: String,
    /// Authenticated caller. Empty means anonymous.
    pub actor_id: String,
    /// Shown in the PR body instead of the actor id when present.
    pub actor_contact: Option<String>,
    pub source_ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimOutput {
    pub pr_url: String,
    pub branch: String,
    /// `None` when an earlier claim's PR was returned without publishing.
    pub work_slug: Option<String>,
    /// The stored PR URL was returned as-is.
    pub reused: bool,
}

/// Moves an open idea to in-progress for the caller and opens a draft work
/// PR with a runnable demo scaffold.
///
/// The store's conditional update (`status = 'open'`) is the only guard
/// against concurrent claims: exactly one caller gets a changed row.
pub struct ClaimWorkflow {
    store: Arc<dyn IdeaStore>,
    limiter: Arc<dyn RateLimiter>,
    publisher: ContentPublisher,
    rate_limit: RateLimit,
    clock: Clock,
}

impl ClaimWorkflow {
    pub const DEFAULT_RATE_LIMIT: RateLimit = RateLimit::per_minute(10);

    pub fn new(
        store: Arc<dyn IdeaStore>,
        limiter: Arc<dyn RateLimiter>,
        publisher: ContentPublisher,
    ) -> Self {
        Self {
            store,
            limiter,
            publisher,
            rate_limit: Self::DEFAULT_RATE_LIMIT,
            clock: system_clock(),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn claim(&self, input: ClaimInput) -> Result<ClaimOutput, WorkflowError> {
        let span = info_span!(
            "claim",
            request_id = %Uuid::new_v4(),
            idea = %format!("{}/{}", input.idea_author_id.trim(), input.idea_slug.trim()),
        );
        self.run(input).instrument(span).await
    }

    async fn run(&self, input: ClaimInput) -> Result<ClaimOutput, WorkflowError> {
        let actor = input.actor_id.trim();
        if actor.is_empty() {
            return Err(WorkflowError::Unauthorized(
                "sign in to claim an idea".to_string(),
            ));
        }

        let key = format!("ideas:claim:{}:{}", actor, input.source_ip);
        let decision = self
            .limiter
            .check(&key, self.rate_limit.limit, self.rate_limit.window)
            .await;
        if !decision.ok {
            warn!(key = %key, "Claim rate limited");
            return Err(WorkflowError::RateLimited(retry_hint(decision.retry_after)));
        }

        let author = normalize_id(&input.idea_author_id, "authorId")?;
        let slug = normalize_id(&input.idea_slug, "slug")?;
        let implementer = normalize_id(&input.implement_author_id, "implementAuthorId")?;

        let idea = self
            .store
            .find(&author, &slug)
            .await
            .map_err(WorkflowError::Store)?
            .ok_or_else(|| WorkflowError::NotFound(format!("idea {author}/{slug} not found")))?;

        let branch = claim_branch_name(actor, &implementer, &slug);

        match (idea.status, idea.claimed_by.as_deref()) {
            (IdeaStatus::Done, _) => {
                return Err(WorkflowError::Conflict(format!(
                    "idea {author}/{slug} is already implemented"
                )));
            }
            (IdeaStatus::InProgress, claimer) if claimer != Some(actor) => {
                return Err(WorkflowError::Conflict(format!(
                    "idea {author}/{slug} is already claimed by someone else"
                )));
            }
            _ => {}
        }

        if let Some(pr_url) = idea.claim_pr_url.clone() {
            info!(pr = %pr_url, "Idea already claimed by caller, returning existing PR");
            return Ok(ClaimOutput {
                pr_url,
                branch,
                work_slug: None,
                reused: true,
            });
        }

        let now = (self.clock)();
        if idea.status == IdeaStatus::Open {
            let patch = IdeaPatch {
                status: Some(IdeaStatus::InProgress),
                claimed_by: Some(actor.to_string()),
                claimed_at: Some(now),
                ..Default::default()
            };
            let changed = self
                .store
                .conditional_update(&author, &slug, IdeaStatus::Open, patch)
                .await
                .map_err(WorkflowError::Store)?;
            if changed == 0 {
                return Err(WorkflowError::Conflict(format!(
                    "idea {author}/{slug} was claimed by someone else first"
                )));
            }
            info!(actor, "Idea moved to in-progress");
        } else {
            info!(actor, "Resuming an unfinished claim");
        }

        let title = idea.display_title();
        let summary = idea.display_summary();
        let idea_id = format!("{author}/{slug}");
        let base = self.publisher.base_branch().to_string();
        let work_slug = resolve_work_slug(self.publisher.api(), &implementer, &slug, &base).await?;

        let meta = WorkMeta {
            title: title.clone(),
            summary: summary.clone(),
            work_type: WorkType::Demo,
            date: iso_date(now),
            draft: Some(true),
            source_idea_id: Some(idea_id.clone()),
            tags: normalize_tags(&idea.tags),
            demo: DemoDescriptor::iframe(&implementer, &work_slug),
        };
        let plan = work_plan(
            &implementer,
            &work_slug,
            &meta,
            claim_body(&title, &idea_id, &summary),
        )?;

        let claimed_by = input
            .actor_contact
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(actor);
        let request = PublishRequest {
            base_branch: base,
            branch_name: branch.clone(),
            commit_message: format!("chore(ideas): claim {idea_id}"),
            plan,
            pull_request: PullRequestDraft {
                title: format!("wip: {title}"),
                body: format!(
                    "Idea: {idea_id}\n\nClaimed by: {claimed_by}\n\nWork: {implementer}/{work_slug}"
                ),
            },
        };
        let outcome = self.publisher.publish(&request).await?;

        let patch = IdeaPatch {
            claimed_by: Some(actor.to_string()),
            claimed_at: Some(idea.claimed_at.unwrap_or(now)),
            claim_pr_url: Some(outcome.pr_url.clone()),
            ..Default::default()
        };
        match self
            .store
            .conditional_update(&author, &slug, IdeaStatus::InProgress, patch)
            .await
        {
            Ok(0) => warn!(pr = %outcome.pr_url, "Idea left in-progress before the PR URL was saved"),
            Ok(_) => {}
            Err(e) => warn!(pr = %outcome.pr_url, error = %format!("{e:#}"), "Failed to save claim PR URL"),
        }

        info!(pr = %outcome.pr_url, work_slug = %work_slug, "Claim published");
        Ok(ClaimOutput {
            pr_url: outcome.pr_url,
            branch,
            work_slug: Some(work_slug),
            reused: false,
        })
    }
}
