use std::sync::Arc;

use ideaworks_common::{CommitPlan, FileContent};
use serde::Serialize;
use tracing::{info, instrument};

use super::api::{PullCreation, RefCreation, RepoApi, TreeEntry};
use super::client::GitHubClient;
use crate::errors::HostingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDraft {
    pub title: String,
    pub body: String,
}

/// Everything needed to land one commit on a branch and open a PR for it.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub base_branch: String,
    pub branch_name: String,
    pub commit_message: String,
    pub plan: CommitPlan,
    pub pull_request: PullRequestDraft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub pr_url: String,
    pub pr_number: u64,
    pub branch: String,
    pub commit_sha: String,
    /// The branch already existed and was force-moved to the new commit.
    pub branch_reset: bool,
    /// An open PR for the branch already existed and was reused.
    pub reused_pull_request: bool,
}

/// Lands a [`CommitPlan`] as a single commit on a fresh (or reset) branch off
/// the base branch, then opens a PR or reuses the one already open.
///
/// Re-publishing the same branch is idempotent from the caller's view: the
/// branch ends up on a commit with exactly the planned files on top of the
/// current base, and there is one open PR for it.
#[derive(Debug, Clone)]
pub struct ContentPublisher {
    api: RepoApi,
}

impl ContentPublisher {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self {
            api: RepoApi::new(client),
        }
    }

    pub fn api(&self) -> &RepoApi {
        &self.api
    }

    pub fn base_branch(&self) -> &str {
        self.api.client().base_branch()
    }

    #[instrument(skip_all, fields(branch = %req.branch_name, base = %req.base_branch, files = req.plan.len()))]
    pub async fn publish(&self, req: &PublishRequest) -> Result<PublishOutcome, HostingError> {
        let base_sha = self.api.branch_sha(&req.base_branch).await?;
        let base_commit = self.api.commit(&base_sha).await?;

        let mut entries = Vec::with_capacity(req.plan.len());
        for change in req.plan.changes() {
            let entry = match &change.content {
                FileContent::Text(text) => TreeEntry::inline(&change.path, text),
                FileContent::Binary(bytes) => {
                    let blob = self.api.create_blob(bytes).await?;
                    TreeEntry::blob(&change.path, blob)
                }
            };
            entries.push(entry);
        }

        let tree = self.api.create_tree(&base_commit.tree.sha, &entries).await?;
        let commit_sha = self
            .api
            .create_commit(&req.commit_message, &tree, &base_sha)
            .await?;

        let branch_reset = match self.api.create_branch(&req.branch_name, &commit_sha).await? {
            RefCreation::Created => false,
            RefCreation::AlreadyExists => {
                self.api
                    .force_update_branch(&req.branch_name, &commit_sha)
                    .await?;
                true
            }
        };

        let (pr, reused_pull_request) = match self
            .api
            .create_pull(
                &req.pull_request.title,
                &req.branch_name,
                &req.base_branch,
                &req.pull_request.body,
            )
            .await?
        {
            PullCreation::Created(pr) => (pr, false),
            PullCreation::AlreadyExists(refusal) => {
                let existing = self.api.open_pulls_for(&req.branch_name).await?;
                let pr = existing.into_iter().next().ok_or_else(|| {
                    HostingError::PullRequestNotFound {
                        head: format!("{}:{}", self.api.client().owner(), req.branch_name),
                        body: refusal,
                    }
                })?;
                (pr, true)
            }
        };

        info!(
            pr = %pr.html_url,
            commit = %commit_sha,
            branch_reset,
            reused_pull_request,
            "Published branch"
        );

        Ok(PublishOutcome {
            pr_url: pr.html_url,
            pr_number: pr.number,
            branch: req.branch_name.clone(),
            commit_sha,
            branch_reset,
            reused_pull_request,
        })
    }
}
