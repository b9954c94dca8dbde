use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::IdeaRef;

/// Maximum number of tags kept on an idea.
pub const MAX_TAGS: usize = 12;

/// Lifecycle of an idea. Only ever moves forward: open → in-progress → done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdeaStatus {
    #[default]
    Open,
    InProgress,
    Done,
}

impl IdeaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in-progress",
            Self::Done => "done",
        }
    }

    /// Lenient parse for values read back from storage or content files.
    /// Anything unrecognised is treated as `Open`.
    pub fn normalize(raw: &str) -> Self {
        raw.trim().parse().unwrap_or_default()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for IdeaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdeaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "in-progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(format!("Invalid idea status: {}", s)),
        }
    }
}

/// A stored idea row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: i64,
    pub author_id: String,
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub details: Option<String>,
    pub tags: Vec<String>,
    pub status: IdeaStatus,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claim_pr_url: Option<String>,
    pub implemented_work_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Idea {
    pub fn idea_ref(&self) -> IdeaRef {
        IdeaRef {
            author_id: self.author_id.clone(),
            slug: self.slug.clone(),
        }
    }

    /// Title to show for this idea, falling back to `author/slug`.
    pub fn display_title(&self) -> String {
        let title = self.title.trim();
        if title.is_empty() {
            self.idea_ref().to_string()
        } else {
            title.to_string()
        }
    }

    /// Summary to show for this idea, falling back to the display title.
    pub fn display_summary(&self) -> String {
        let summary = self.summary.trim();
        if summary.is_empty() {
            self.display_title()
        } else {
            summary.to_string()
        }
    }
}

/// Fields required to insert a new idea. Status always starts as `Open`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIdea {
    pub author_id: String,
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub details: Option<String>,
    pub tags: Vec<String>,
    pub created_by: String,
}

/// Partial update applied by a conditional store write. `None` leaves the
/// column untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdeaPatch {
    pub status: Option<IdeaStatus>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claim_pr_url: Option<String>,
    pub implemented_work_id: Option<String>,
}

impl IdeaPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.claimed_by.is_none()
            && self.claimed_at.is_none()
            && self.claim_pr_url.is_none()
            && self.implemented_work_id.is_none()
    }
}

/// Trim tags, drop empties and duplicates (first occurrence wins), and keep at
/// most [`MAX_TAGS`].
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        out.push(tag.to_string());
        if out.len() == MAX_TAGS {
            break;
        }
    }
    out
}
