use std::sync::Arc;

use ideaworks_common::{Idea, NewIdea, normalize_id, normalize_tags, slugify};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use super::{RateLimit, retry_hint};
use crate::errors::WorkflowError;
use crate::ratelimit::RateLimiter;
use crate::store::{DuplicateIdea, IdeaStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishIdeaInput {
    pub author_id: String,
    pub title: String,
    pub summary: String,
    pub details: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub actor_id: String,
    pub source_ip: String,
}

/// Records a new open idea in the store.
pub struct PublishIdeaWorkflow {
    store: Arc<dyn IdeaStore>,
    limiter: Arc<dyn RateLimiter>,
    rate_limit: RateLimit,
}

impl PublishIdeaWorkflow {
    pub const DEFAULT_RATE_LIMIT: RateLimit = RateLimit::per_minute(6);

    pub fn new(store: Arc<dyn IdeaStore>, limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            store,
            limiter,
            rate_limit: Self::DEFAULT_RATE_LIMIT,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub async fn publish(&self, input: PublishIdeaInput) -> Result<Idea, WorkflowError> {
        let span = info_span!(
            "publish_idea",
            request_id = %Uuid::new_v4(),
            author = %input.author_id.trim(),
        );
        self.run(input).instrument(span).await
    }

    async fn run(&self, input: PublishIdeaInput) -> Result<Idea, WorkflowError> {
        let actor = input.actor_id.trim();
        if actor.is_empty() {
            return Err(WorkflowError::Unauthorized(
                "sign in to publish an idea".to_string(),
            ));
        }

        let key = format!("ideas:publish:{}:{}", actor, input.source_ip);
        let decision = self
            .limiter
            .check(&key, self.rate_limit.limit, self.rate_limit.window)
            .await;
        if !decision.ok {
            warn!(key = %key, "Publish rate limited");
            return Err(WorkflowError::RateLimited(retry_hint(decision.retry_after)));
        }

        let author = normalize_id(&input.author_id, "authorId")?;
        let title = input.title.trim();
        if title.is_empty() {
            return Err(WorkflowError::BadRequest("title is required".to_string()));
        }
        let summary = input.summary.trim();
        if summary.is_empty() {
            return Err(WorkflowError::BadRequest("summary is required".to_string()));
        }
        let details = input
            .details
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        let new_idea = NewIdea {
            slug: slugify(title, "idea"),
            author_id: author,
            title: title.to_string(),
            summary: summary.to_string(),
            details,
            tags: normalize_tags(&input.tags),
            created_by: actor.to_string(),
        };

        let idea = self.store.insert(new_idea).await.map_err(|e| {
            match e.downcast_ref::<DuplicateIdea>() {
                Some(dup) => WorkflowError::Conflict(format!(
                    "idea {}/{} already exists",
                    dup.author_id, dup.slug
                )),
                None => WorkflowError::Store(e),
            }
        })?;

        info!(idea = %idea.idea_ref(), "Idea published");
        Ok(idea)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::TokenBucketLimiter;
    use crate::store::SqliteIdeaStore;
    use ideaworks_common::IdeaStatus;

    fn workflow() -> (PublishIdeaWorkflow, Arc<SqliteIdeaStore>) {
        let store = Arc::new(SqliteIdeaStore::in_memory().unwrap());
        let limiter = Arc::new(TokenBucketLimiter::new());
        (PublishIdeaWorkflow::new(store.clone(), limiter), store)
    }

    fn input(title: &str) -> PublishIdeaInput {
        PublishIdeaInput {
            author_id: " gcy ".into(),
            title: title.into(),
            summary: "Embeddable comments".into(),
            details: Some("   ".into()),
            tags: vec!["ui".into(), " ui ".into(), "react".into()],
            actor_id: "u1".into(),
            source_ip: "1.2.3.4".into(),
        }
    }

    #[tokio::test]
    async fn test_publish_inserts_open_idea() {
        let (wf, store) = workflow();
        let idea = wf.publish(input("Comment Widget!")).await.unwrap();
        assert_eq!(idea.author_id, "gcy");
        assert_eq!(idea.slug, "comment-widget");
        assert_eq!(idea.status, IdeaStatus::Open);
        assert_eq!(idea.tags, vec!["ui", "react"]);
        assert_eq!(idea.details, None);
        assert_eq!(idea.created_by, "u1");

        let found = store.find("gcy", "comment-widget").await.unwrap();
        assert_eq!(found, Some(idea));
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict() {
        let (wf, _) = workflow();
        wf.publish(input("Widget")).await.unwrap();
        let err = wf.publish(input("widget")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)), "got {err:?}");
        assert_eq!(err.http_status(), 409);
    }

    #[tokio::test]
    async fn test_anonymous_is_unauthorized() {
        let (wf, _) = workflow();
        let mut anon = input("Widget");
        anon.actor_id = "  ".into();
        let err = wf.publish(anon).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_blank_title_or_summary_is_bad_request() {
        let (wf, _) = workflow();
        let err = wf.publish(input("  ")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::BadRequest(_)));

        let mut blank = input("Widget");
        blank.summary = "".into();
        let err = wf.publish(blank).await.unwrap_err();
        assert!(matches!(err, WorkflowError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_rate_limited_after_budget() {
        let (wf, _) = workflow();
        let wf = wf.with_rate_limit(RateLimit::per_minute(1));
        wf.publish(input("First")).await.unwrap();
        let err = wf.publish(input("Second")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::RateLimited(_)));
        assert_eq!(err.code().as_str(), "RATE_LIMITED");
    }
}
