//! Typed wrappers around the GitHub git-data, pulls and contents endpoints.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::client::GitHubClient;
use crate::errors::{HostingError, truncate_body};

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub tree: TreeRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeRef {
    pub sha: String,
}

/// A pull request (subset of fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: Option<String>,
    encoding: Option<String>,
}

/// One entry of a tree-creation request. Exactly one of `content` or `sha`
/// is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

impl TreeEntry {
    pub fn inline(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "100644",
            kind: "blob",
            content: Some(content.into()),
            sha: None,
        }
    }

    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "100644",
            kind: "blob",
            content: None,
            sha: Some(sha.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefCreation {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullCreation {
    Created(PullRequest),
    /// The host refused because an open PR for this head already exists.
    /// Carries the (truncated) refusal body.
    AlreadyExists(String),
}

/// Repository-scoped API operations used by the publisher and workflows.
#[derive(Debug, Clone)]
pub struct RepoApi {
    client: Arc<GitHubClient>,
}

impl RepoApi {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    /// Head commit SHA of `branch`.
    pub async fn branch_sha(&self, branch: &str) -> Result<String, HostingError> {
        let path = self.client.repo_path(&format!("/git/ref/heads/{branch}"));
        let resp = self.client.request(Method::GET, &path, None).await?;
        let body: RefResponse =
            read_json(expect_success(resp, "read base ref").await?, "read base ref").await?;
        Ok(body.object.sha)
    }

    pub async fn commit(&self, sha: &str) -> Result<CommitInfo, HostingError> {
        let path = self.client.repo_path(&format!("/git/commits/{sha}"));
        let resp = self.client.request(Method::GET, &path, None).await?;
        read_json(expect_success(resp, "read base commit").await?, "read base commit").await
    }

    /// Upload raw bytes as a blob and return its SHA.
    pub async fn create_blob(&self, bytes: &[u8]) -> Result<String, HostingError> {
        let body = json!({ "content": STANDARD.encode(bytes), "encoding": "base64" });
        let path = self.client.repo_path("/git/blobs");
        let resp = self.client.request(Method::POST, &path, Some(&body)).await?;
        let created: ShaResponse =
            read_json(expect_success(resp, "create blob").await?, "create blob").await?;
        Ok(created.sha)
    }

    pub async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, HostingError> {
        let body = json!({ "base_tree": base_tree, "tree": entries });
        let path = self.client.repo_path("/git/trees");
        let resp = self.client.request(Method::POST, &path, Some(&body)).await?;
        let created: ShaResponse =
            read_json(expect_success(resp, "create tree").await?, "create tree").await?;
        Ok(created.sha)
    }

    pub async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parent: &str,
    ) -> Result<String, HostingError> {
        let body = json!({ "message": message, "tree": tree, "parents": [parent] });
        let path = self.client.repo_path("/git/commits");
        let resp = self.client.request(Method::POST, &path, Some(&body)).await?;
        let created: ShaResponse =
            read_json(expect_success(resp, "create commit").await?, "create commit").await?;
        Ok(created.sha)
    }

    /// Create `refs/heads/{branch}` pointing at `sha`. An existing ref is
    /// reported as [`RefCreation::AlreadyExists`], not an error.
    pub async fn create_branch(&self, branch: &str, sha: &str) -> Result<RefCreation, HostingError> {
        let body = json!({ "ref": format!("refs/heads/{branch}"), "sha": sha });
        let path = self.client.repo_path("/git/refs");
        let resp = self.client.request(Method::POST, &path, Some(&body)).await?;
        if resp.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let text = resp.text().await.unwrap_or_default();
            if text.contains("Reference already exists") {
                return Ok(RefCreation::AlreadyExists);
            }
            return Err(HostingError::Status {
                step: "create branch",
                status: StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
                body: truncate_body(&text),
            });
        }
        expect_success(resp, "create branch").await?;
        Ok(RefCreation::Created)
    }

    /// Move `branch` to `sha`, discarding whatever it pointed at before.
    pub async fn force_update_branch(&self, branch: &str, sha: &str) -> Result<(), HostingError> {
        let body = json!({ "sha": sha, "force": true });
        let path = self.client.repo_path(&format!("/git/refs/heads/{branch}"));
        let resp = self.client.request(Method::PATCH, &path, Some(&body)).await?;
        expect_success(resp, "update branch").await?;
        Ok(())
    }

    pub async fn create_pull(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullCreation, HostingError> {
        let payload = json!({ "title": title, "head": head, "base": base, "body": body });
        let path = self.client.repo_path("/pulls");
        let resp = self.client.request(Method::POST, &path, Some(&payload)).await?;
        if resp.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let text = resp.text().await.unwrap_or_default();
            if text.to_ascii_lowercase().contains("already exists") {
                return Ok(PullCreation::AlreadyExists(truncate_body(&text)));
            }
            return Err(HostingError::Status {
                step: "create pull request",
                status: StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
                body: truncate_body(&text),
            });
        }
        let pr = read_json(
            expect_success(resp, "create pull request").await?,
            "create pull request",
        )
        .await?;
        Ok(PullCreation::Created(pr))
    }

    /// Open pull requests whose head is `{owner}:{branch}`.
    pub async fn open_pulls_for(&self, branch: &str) -> Result<Vec<PullRequest>, HostingError> {
        let head = format!("{}:{}", self.client.owner(), branch);
        let path = self.client.repo_path("/pulls");
        let resp = self
            .client
            .get_with_query(&path, &[("head", head.as_str()), ("state", "open")])
            .await?;
        read_json(
            expect_success(resp, "list pull requests").await?,
            "list pull requests",
        )
        .await
    }

    /// Whether `path` exists at `git_ref`. Only a 404 counts as absent: any
    /// other status that survived the retries is reported as present, so an
    /// unreadable path is never chosen as free.
    pub async fn path_exists(&self, path: &str, git_ref: &str) -> Result<bool, HostingError> {
        let resp = self.contents(path, git_ref).await?;
        Ok(resp.status() != StatusCode::NOT_FOUND)
    }

    /// Read a UTF-8 file at `git_ref`. `Ok(None)` when the path does not exist.
    pub async fn read_text_file(
        &self,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<String>, HostingError> {
        let resp = self.contents(path, git_ref).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: ContentsResponse =
            read_json(expect_success(resp, "read file").await?, "read file").await?;
        let encoded = body.content.ok_or_else(|| HostingError::Decode {
            step: "read file",
            message: format!("{path} has no inline content"),
        })?;
        match body.encoding.as_deref() {
            None | Some("base64") => {}
            Some(other) => {
                return Err(HostingError::Decode {
                    step: "read file",
                    message: format!("{path} uses unsupported encoding '{other}'"),
                });
            }
        }
        decode_content(&encoded)
            .map(Some)
            .map_err(|message| HostingError::Decode {
                step: "read file",
                message: format!("{path}: {message}"),
            })
    }

    async fn contents(&self, path: &str, git_ref: &str) -> Result<Response, HostingError> {
        let api_path = self
            .client
            .repo_path(&format!("/contents/{}", path.trim_start_matches('/')));
        self.client
            .get_with_query(&api_path, &[("ref", git_ref)])
            .await
    }
}

/// Decode base64 file content as returned by the contents API, which wraps
/// lines with `\n`.
pub fn decode_content(encoded: &str) -> Result<String, String> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| format!("invalid base64: {e}"))?;
    String::from_utf8(bytes).map_err(|e| format!("not UTF-8: {e}"))
}

async fn expect_success(resp: Response, step: &'static str) -> Result<Response, HostingError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    Err(HostingError::Status {
        step,
        status: status.as_u16(),
        body: truncate_body(&text),
    })
}

async fn read_json<T: DeserializeOwned>(
    resp: Response,
    step: &'static str,
) -> Result<T, HostingError> {
    resp.json::<T>().await.map_err(|e| HostingError::Decode {
        step,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_content_strips_line_breaks() {
        let encoded = STANDARD.encode("title: Hello\nsummary: World\n");
        let wrapped = format!("{}\n{}\n", &encoded[..10], &encoded[10..]);
        assert_eq!(
            decode_content(&wrapped).unwrap(),
            "title: Hello\nsummary: World\n"
        );
    }

    #[test]
    fn test_decode_content_rejects_garbage() {
        assert!(decode_content("!!!not base64!!!").is_err());
    }

    #[test]
    fn test_tree_entry_serialization() {
        let inline = serde_json::to_value(TreeEntry::inline("a.md", "hi")).unwrap();
        assert_eq!(inline["type"], "blob");
        assert_eq!(inline["mode"], "100644");
        assert_eq!(inline["content"], "hi");
        assert!(inline.get("sha").is_none());

        let blob = serde_json::to_value(TreeEntry::blob("logo.png", "abc123")).unwrap();
        assert_eq!(blob["sha"], "abc123");
        assert!(blob.get("content").is_none());
    }
}
