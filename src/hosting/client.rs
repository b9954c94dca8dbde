//! Retrying client for the GitHub REST API.
//!
//! Every request carries the fixed GitHub headers and bearer token. Responses
//! with status 429 or >= 500 and transport failures are retried with a short
//! bounded backoff; everything else is handed back to the caller as-is.

use std::fmt;
use std::time::Duration;

use reqwest::header::{ACCEPT, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{HostingError, truncate_body};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_BASE_BRANCH: &str = "main";
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION_HEADER: &str = "x-github-api-version";
const GITHUB_API_VERSION: &str = "2022-11-28";
const CLIENT_USER_AGENT: &str = concat!("ideaworks/", env!("CARGO_PKG_VERSION"));

const MIN_STATUS_BACKOFF_MS: u64 = 150;
const MAX_STATUS_BACKOFF_MS: u64 = 1500;
const STATUS_BACKOFF_STEP_MS: u64 = 300;
const TRANSPORT_BACKOFF_STEP_MS: u64 = 250;

/// Connection settings for one target repository.
#[derive(Clone)]
pub struct GitHubSettings {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    pub base_branch: String,
    pub token: String,
    pub retries: u32,
    pub timeout: Duration,
}

impl fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("api_url", &self.api_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("base_branch", &self.base_branch)
            .field("token", &"<redacted>")
            .field("retries", &self.retries)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// HTTP client bound to a single `owner/repo`.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    settings: GitHubSettings,
}

impl GitHubClient {
    pub fn new(settings: GitHubSettings) -> Result<Self, HostingError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(HostingError::Transport)?;
        Ok(Self { http, settings })
    }

    pub fn owner(&self) -> &str {
        &self.settings.owner
    }

    pub fn repo(&self) -> &str {
        &self.settings.repo
    }

    pub fn base_branch(&self) -> &str {
        &self.settings.base_branch
    }

    /// `/repos/{owner}/{repo}{suffix}`
    pub fn repo_path(&self, suffix: &str) -> String {
        format!(
            "/repos/{}/{}{}",
            self.settings.owner, self.settings.repo, suffix
        )
    }

    /// Send a request to `path` (relative to the API root), retrying transient
    /// failures. Non-retryable responses are returned unchanged whatever their
    /// status.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, HostingError> {
        self.send(method, path, &[], body).await
    }

    /// GET with query parameters.
    pub async fn get_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, HostingError> {
        self.send(Method::GET, path, query, None).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Response, HostingError> {
        let url = format!("{}{}", self.settings.api_url.trim_end_matches('/'), path);
        let attempts = attempt_budget(self.settings.retries);
        let mut attempt = 0;

        loop {
            let mut req = self
                .http
                .request(method.clone(), &url)
                .header(ACCEPT, GITHUB_ACCEPT)
                .header(GITHUB_API_VERSION_HEADER, GITHUB_API_VERSION)
                .header(USER_AGENT, CLIENT_USER_AGENT)
                .bearer_auth(&self.settings.token);
            if !query.is_empty() {
                req = req.query(query);
            }
            if let Some(body) = body {
                req = req.json(body);
            }

            let last_attempt = attempt + 1 >= attempts;
            match req.send().await {
                Ok(resp) if is_retryable(resp.status()) => {
                    let status = resp.status();
                    if last_attempt {
                        let text = resp.text().await.unwrap_or_default();
                        return Err(HostingError::RetriesExhausted {
                            attempts,
                            status: status.as_u16(),
                            body: truncate_body(&text),
                        });
                    }
                    let retry_after = resp
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    let wait = backoff_for_status(attempt, retry_after.as_deref());
                    warn!(
                        %method, path, status = status.as_u16(), attempt,
                        wait_ms = wait.as_millis() as u64,
                        "Retrying hosting request after transient status"
                    );
                    tokio::time::sleep(wait).await;
                }
                Ok(resp) => {
                    debug!(%method, path, status = resp.status().as_u16(), "Hosting request done");
                    return Ok(resp);
                }
                Err(err) => {
                    if last_attempt {
                        return Err(HostingError::Transport(err));
                    }
                    let wait = backoff_for_transport(attempt);
                    warn!(
                        %method, path, attempt, error = %err,
                        wait_ms = wait.as_millis() as u64,
                        "Retrying hosting request after transport error"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
            attempt += 1;
        }
    }
}

fn attempt_budget(retries: u32) -> u32 {
    retries.saturating_add(1)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Wait before retrying a 429 / 5xx response.
///
/// A numeric `retry-after` (seconds) wins; otherwise `300ms * (attempt + 1)`.
/// The result is clamped to 150..=1500ms either way. HTTP-date values are not
/// understood and fall back to the default.
pub fn backoff_for_status(attempt: u32, retry_after: Option<&str>) -> Duration {
    let ms = retry_after
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| (secs * 1000.0) as u64)
        .unwrap_or(STATUS_BACKOFF_STEP_MS * (u64::from(attempt) + 1));
    Duration::from_millis(ms.clamp(MIN_STATUS_BACKOFF_MS, MAX_STATUS_BACKOFF_MS))
}

/// Wait before retrying after a transport error: `250ms * (attempt + 1)`.
pub fn backoff_for_transport(attempt: u32) -> Duration {
    Duration::from_millis(TRANSPORT_BACKOFF_STEP_MS * (u64::from(attempt) + 1))
}
