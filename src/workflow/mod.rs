//! The three user-facing workflows: publish an idea, claim it, complete it.
//!
//! Each workflow is a plain struct holding its collaborators behind `Arc`s and
//! exposing one async method that takes an input struct and returns either an
//! output struct or a [`WorkflowError`](crate::errors::WorkflowError).

pub mod claim;
pub mod complete;
pub mod publish_idea;
pub mod scaffold;
pub mod slug;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub use claim::{ClaimInput, ClaimOutput, ClaimWorkflow};
pub use complete::{CompleteInput, CompleteOutput, CompletionWorkflow};
pub use publish_idea::{PublishIdeaInput, PublishIdeaWorkflow};

use crate::config::LIMIT_WINDOW;

/// Source of "now", injectable for deterministic tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// A `limit` per `window` budget for one kind of action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimit {
    pub const fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            window: LIMIT_WINDOW,
        }
    }
}

/// First 8 characters of the actor id, keeping only `[A-Za-z0-9-]`.
/// Falls back to `actor` so the branch name never has an empty segment.
pub fn actor_prefix(actor_id: &str) -> String {
    let prefix: String = actor_id
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(8)
        .collect();
    if prefix.is_empty() {
        "actor".to_string()
    } else {
        prefix
    }
}

/// `impl/{actor8}/{implementer}-{idea_slug}`
pub fn claim_branch_name(actor_id: &str, implementer: &str, idea_slug: &str) -> String {
    format!(
        "impl/{}/{implementer}-{idea_slug}",
        actor_prefix(actor_id)
    )
}

/// `ideas/complete/{implementer}/{author}-{slug}`
pub fn completion_branch_name(implementer: &str, idea_author: &str, idea_slug: &str) -> String {
    format!("ideas/complete/{implementer}/{idea_author}-{idea_slug}")
}

fn retry_hint(wait: Duration) -> String {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    format!("too many requests, retry in {}s", secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_prefix_truncates_and_filters() {
        assert_eq!(actor_prefix("u1"), "u1");
        assert_eq!(actor_prefix("0f8e2a9c-1234-5678"), "0f8e2a9c");
        assert_eq!(actor_prefix("ab_cd.ef/gh-ijkl"), "abcdefgh");
        assert_eq!(actor_prefix("@@@"), "actor");
    }

    #[test]
    fn test_branch_names() {
        assert_eq!(claim_branch_name("u1", "ana", "widget"), "impl/u1/ana-widget");
        assert_eq!(
            completion_branch_name("ana", "gcy", "widget"),
            "ideas/complete/ana/gcy-widget"
        );
    }

    #[test]
    fn test_retry_hint_rounds_up() {
        assert_eq!(retry_hint(Duration::from_millis(5200)), "too many requests, retry in 6s");
        assert_eq!(retry_hint(Duration::ZERO), "too many requests, retry in 1s");
    }
}
