//! Persistence of idea records.
//!
//! Workflows only see the [`IdeaStore`] trait. The one real implementation is
//! [`SqliteIdeaStore`]; tests may swap in their own.

pub mod db;

use anyhow::Result;
use async_trait::async_trait;
use ideaworks_common::{Idea, IdeaPatch, IdeaStatus, NewIdea};
use thiserror::Error;

pub use db::{IdeaDb, SqliteIdeaStore};

/// Returned (inside `anyhow::Error`) by [`IdeaStore::insert`] when
/// `(author_id, slug)` is already taken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("idea {author_id}/{slug} already exists")]
pub struct DuplicateIdea {
    pub author_id: String,
    pub slug: String,
}

#[async_trait]
pub trait IdeaStore: Send + Sync {
    async fn find(&self, author_id: &str, slug: &str) -> Result<Option<Idea>>;

    async fn insert(&self, idea: NewIdea) -> Result<Idea>;

    /// Apply `patch` only if the row's current status equals `expected`.
    /// Returns the number of rows changed (0 or 1).
    async fn conditional_update(
        &self,
        author_id: &str,
        slug: &str,
        expected: IdeaStatus,
        patch: IdeaPatch,
    ) -> Result<u64>;
}
