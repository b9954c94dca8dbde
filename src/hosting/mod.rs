//! Hosting API access: the retrying HTTP client, typed repository endpoints
//! and the branch + PR publisher built on top of them.

pub mod api;
pub mod client;
pub mod publisher;

pub use api::{PullCreation, PullRequest, RefCreation, RepoApi};
pub use client::{GitHubClient, GitHubSettings};
pub use publisher::{ContentPublisher, PublishOutcome, PublishRequest, PullRequestDraft};
