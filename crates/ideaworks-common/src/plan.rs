use serde::{Deserialize, Serialize};

/// Content of a single file write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum FileContent {
    /// UTF-8 text, inlined into the tree request.
    Text(String),
    /// Arbitrary bytes, uploaded as a blob first and referenced by SHA.
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub content: FileContent,
}

impl FileChange {
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: clean_path(path.into()),
            content: FileContent::Text(content.into()),
        }
    }

    pub fn binary(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            path: clean_path(path.into()),
            content: FileContent::Binary(bytes),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.content, FileContent::Binary(_))
    }
}

fn clean_path(path: String) -> String {
    path.trim_start_matches('/').to_string()
}

/// An ordered set of file writes that become one commit.
///
/// Paths are unique: writing a path twice replaces the earlier content but
/// keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPlan {
    changes: Vec<FileChange>,
}

impl CommitPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: FileChange) {
        match self.changes.iter_mut().find(|c| c.path == change.path) {
            Some(existing) => existing.content = change.content,
            None => self.changes.push(change),
        }
    }

    pub fn with(mut self, change: FileChange) -> Self {
        self.push(change);
        self
    }

    pub fn changes(&self) -> &[FileChange] {
        &self.changes
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|c| c.path.as_str())
    }

    pub fn get(&self, path: &str) -> Option<&FileChange> {
        self.changes.iter().find(|c| c.path == path)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl Extend<FileChange> for CommitPlan {
    fn extend<T: IntoIterator<Item = FileChange>>(&mut self, iter: T) {
        for change in iter {
            self.push(change);
        }
    }
}

impl FromIterator<FileChange> for CommitPlan {
    fn from_iter<T: IntoIterator<Item = FileChange>>(iter: T) -> Self {
        let mut plan = Self::new();
        plan.extend(iter);
        plan
    }
}
