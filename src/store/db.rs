use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ideaworks_common::{Idea, IdeaPatch, IdeaStatus, NewIdea};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params, params_from_iter};
use tracing::warn;

use super::{DuplicateIdea, IdeaStore};

const IDEA_COLUMNS: &str = "id, author_id, slug, title, summary, details, tags, status, \
     claimed_by, claimed_at, claim_pr_url, implemented_work_id, created_by, created_at";

/// Async-safe handle to the ideas database.
///
/// Wraps `IdeaDb` behind `Arc<Mutex>` and runs every query on tokio's blocking
/// pool via `spawn_blocking`.
#[derive(Clone)]
pub struct SqliteIdeaStore {
    inner: Arc<std::sync::Mutex<IdeaDb>>,
}

impl SqliteIdeaStore {
    pub fn new(db: IdeaDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(IdeaDb::new(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(IdeaDb::new_in_memory()?))
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&IdeaDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. For setup code and tests,
    /// never from a hot async path.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, IdeaDb>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }
}

#[async_trait]
impl IdeaStore for SqliteIdeaStore {
    async fn find(&self, author_id: &str, slug: &str) -> Result<Option<Idea>> {
        let (author_id, slug) = (author_id.to_string(), slug.to_string());
        self.call(move |db| db.get_idea(&author_id, &slug)).await
    }

    async fn insert(&self, idea: NewIdea) -> Result<Idea> {
        self.call(move |db| db.insert_idea(&idea)).await
    }

    async fn conditional_update(
        &self,
        author_id: &str,
        slug: &str,
        expected: IdeaStatus,
        patch: IdeaPatch,
    ) -> Result<u64> {
        let (author_id, slug) = (author_id.to_string(), slug.to_string());
        self.call(move |db| db.update_idea_if_status(&author_id, &slug, expected, &patch))
            .await
    }
}

pub struct IdeaDb {
    conn: Connection,
}

impl IdeaDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .busy_timeout(Duration::from_secs(5))
            .context("Failed to set SQLite busy timeout")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS ideas (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    author_id TEXT NOT NULL,
                    slug TEXT NOT NULL,
                    title TEXT NOT NULL,
                    summary TEXT NOT NULL DEFAULT '',
                    details TEXT,
                    tags TEXT NOT NULL DEFAULT '[]',
                    status TEXT NOT NULL DEFAULT 'open',
                    claimed_by TEXT,
                    claimed_at TEXT,
                    claim_pr_url TEXT,
                    implemented_work_id TEXT,
                    created_by TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE(author_id, slug)
                );

                CREATE INDEX IF NOT EXISTS idx_ideas_status ON ideas(status);
                ",
            )
            .context("Failed to create ideas table")?;
        Ok(())
    }

    pub fn get_idea(&self, author_id: &str, slug: &str) -> Result<Option<Idea>> {
        let sql = format!("SELECT {IDEA_COLUMNS} FROM ideas WHERE author_id = ?1 AND slug = ?2");
        let row = self
            .conn
            .query_row(&sql, params![author_id, slug], IdeaRow::from_row)
            .optional()
            .context("Failed to query idea")?;
        row.map(IdeaRow::into_idea).transpose()
    }

    pub fn list_ideas(&self, status: Option<IdeaStatus>) -> Result<Vec<Idea>> {
        let status = status.map(|s| s.as_str());
        let sql = format!(
            "SELECT {IDEA_COLUMNS} FROM ideas WHERE ?1 IS NULL OR status = ?1 ORDER BY id"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_ideas")?;
        let rows = stmt
            .query_map(params![status], IdeaRow::from_row)
            .context("Failed to query ideas")?;
        let mut ideas = Vec::new();
        for row in rows {
            let r = row.context("Failed to read idea row")?;
            ideas.push(r.into_idea()?);
        }
        Ok(ideas)
    }

    pub fn insert_idea(&self, idea: &NewIdea) -> Result<Idea> {
        let tags = serde_json::to_string(&idea.tags).context("Failed to encode tags")?;
        let created_at = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO ideas (author_id, slug, title, summary, details, tags, status, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                idea.author_id,
                idea.slug,
                idea.title,
                idea.summary,
                idea.details,
                tags,
                IdeaStatus::Open.as_str(),
                idea.created_by,
                created_at,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(DuplicateIdea {
                    author_id: idea.author_id.clone(),
                    slug: idea.slug.clone(),
                }
                .into());
            }
            Err(e) => return Err(e).context("Failed to insert idea"),
        }
        self.get_idea(&idea.author_id, &idea.slug)?
            .context("Idea not found after insert")
    }

    /// Apply `patch` to the row only while its status is still `expected`.
    /// The status check and the write are one statement, so two racing
    /// callers cannot both see a changed row.
    pub fn update_idea_if_status(
        &self,
        author_id: &str,
        slug: &str,
        expected: IdeaStatus,
        patch: &IdeaPatch,
    ) -> Result<u64> {
        let mut sets = vec!["updated_at = datetime('now')"];
        let mut values: Vec<Value> = Vec::new();
        if let Some(status) = patch.status {
            sets.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(claimed_by) = &patch.claimed_by {
            sets.push("claimed_by = ?");
            values.push(Value::Text(claimed_by.clone()));
        }
        if let Some(claimed_at) = patch.claimed_at {
            sets.push("claimed_at = ?");
            values.push(Value::Text(claimed_at.to_rfc3339()));
        }
        if let Some(url) = &patch.claim_pr_url {
            sets.push("claim_pr_url = ?");
            values.push(Value::Text(url.clone()));
        }
        if let Some(work_id) = &patch.implemented_work_id {
            sets.push("implemented_work_id = ?");
            values.push(Value::Text(work_id.clone()));
        }
        values.push(Value::Text(author_id.to_string()));
        values.push(Value::Text(slug.to_string()));
        values.push(Value::Text(expected.as_str().to_string()));

        let sql = format!(
            "UPDATE ideas SET {} WHERE author_id = ? AND slug = ? AND status = ?",
            sets.join(", ")
        );
        let changed = self
            .conn
            .execute(&sql, params_from_iter(values.iter()))
            .context("Failed to update idea")?;
        Ok(changed as u64)
    }
}

/// Intermediate row struct for reading ideas from SQLite before converting
/// status / tags / timestamps into typed values.
struct IdeaRow {
    id: i64,
    author_id: String,
    slug: String,
    title: String,
    summary: String,
    details: Option<String>,
    tags: String,
    status: String,
    claimed_by: Option<String>,
    claimed_at: Option<String>,
    claim_pr_url: Option<String>,
    implemented_work_id: Option<String>,
    created_by: String,
    created_at: String,
}

impl IdeaRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            author_id: row.get(1)?,
            slug: row.get(2)?,
            title: row.get(3)?,
            summary: row.get(4)?,
            details: row.get(5)?,
            tags: row.get(6)?,
            status: row.get(7)?,
            claimed_by: row.get(8)?,
            claimed_at: row.get(9)?,
            claim_pr_url: row.get(10)?,
            implemented_work_id: row.get(11)?,
            created_by: row.get(12)?,
            created_at: row.get(13)?,
        })
    }

    fn into_idea(self) -> Result<Idea> {
        let status = IdeaStatus::from_str(&self.status).unwrap_or_else(|_| {
            warn!(id = self.id, status = %self.status, "Unknown idea status, treating as open");
            IdeaStatus::Open
        });
        let tags: Vec<String> =
            serde_json::from_str(&self.tags).context("Failed to parse idea tags JSON")?;
        let claimed_at = self
            .claimed_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .context("Failed to parse claimed_at")?;
        let created_at = parse_timestamp(&self.created_at).context("Failed to parse created_at")?;

        Ok(Idea {
            id: self.id,
            author_id: self.author_id,
            slug: self.slug,
            title: self.title,
            summary: self.summary,
            details: self.details,
            tags,
            status,
            claimed_by: self.claimed_by,
            claimed_at,
            claim_pr_url: self.claim_pr_url,
            implemented_work_id: self.implemented_work_id,
            created_by: self.created_by,
            created_at,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp: {}", raw))?
        .with_timezone(&Utc))
}

// ── Tests ─────────────────────────────────────────────────────────────
