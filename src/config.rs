//! Configuration for ideaworks.
//!
//! Settings are read from `.ideaworks/ideaworks.toml` and then overridden by
//! environment variables (a `.env` file is loaded first by the binary):
//!
//! | Setting              | File key               | Env var          |
//! |----------------------|------------------------|------------------|
//! | repository owner     | `github.owner`         | `GITHUB_OWNER`   |
//! | repository name      | `github.repo`          | `GITHUB_REPO`    |
//! | base branch          | `github.base`          | `GITHUB_BASE`    |
//! | API root             | `github.api_url`       | `GITHUB_API_URL` |
//! | access token         | (env only)             | `GITHUB_TOKEN`   |
//! | SQLite file          | `store.db_path`        | `IDEAWORKS_DB`   |
//!
//! # Configuration File Format
//!
//! ```toml
//! [github]
//! owner = "acme"
//! repo = "works"
//! base = "main"
//! api_url = "https://api.github.com"
//! retries = 2
//! timeout_secs = 30
//!
//! [store]
//! db_path = ".ideaworks/ideas.db"
//!
//! [limits]
//! claim_per_minute = 10
//! publish_per_minute = 6
//! ```

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::hosting::GitHubSettings;
use crate::hosting::client::{DEFAULT_API_URL, DEFAULT_BASE_BRANCH, DEFAULT_RETRIES};

pub const CONFIG_DIR: &str = ".ideaworks";
pub const CONFIG_FILE: &str = "ideaworks.toml";
const DEFAULT_DB_FILE: &str = "ideas.db";

/// Rate-limit window shared by all limits.
pub const LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Known GitHub token prefixes.
const GITHUB_TOKEN_PREFIXES: &[&str] = &[
    "ghp_",        // Personal access tokens (classic)
    "github_pat_", // Fine-grained personal access tokens
    "gho_",        // OAuth access tokens
    "ghu_",        // GitHub App user-to-server tokens
    "ghs_",        // GitHub App server-to-server tokens
];

// GitHub logins: alphanumerics with single hyphens between them.
static OWNER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9](?:-?[A-Za-z0-9]){0,38}$").unwrap());

static REPO_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,100}$").unwrap());

/// Format check only: says nothing about whether the token is live.
pub fn is_valid_github_token(token: &str) -> bool {
    GITHUB_TOKEN_PREFIXES
        .iter()
        .any(|prefix| token.starts_with(prefix))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubSection {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default = "default_base")]
    pub base: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Retries after the first attempt for transient failures.
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base() -> String {
    DEFAULT_BASE_BRANCH.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for GitHubSection {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            base: default_base(),
            api_url: default_api_url(),
            retries: default_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSection {
    /// Relative paths resolve against the project directory.
    #[serde(default)]
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsSection {
    #[serde(default = "default_claim_per_minute")]
    pub claim_per_minute: u32,
    #[serde(default = "default_publish_per_minute")]
    pub publish_per_minute: u32,
}

fn default_claim_per_minute() -> u32 {
    10
}

fn default_publish_per_minute() -> u32 {
    6
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            claim_per_minute: default_claim_per_minute(),
            publish_per_minute: default_publish_per_minute(),
        }
    }
}

/// Contents of `ideaworks.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaworksToml {
    #[serde(default)]
    pub github: GitHubSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub limits: LimitsSection,
}

impl IdeaworksToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse ideaworks.toml")
    }

    /// Load `ideaworks.toml` from `config_dir`, or defaults when it is absent.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize ideaworks.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.github.api_url.starts_with("http://") && !self.github.api_url.starts_with("https://")
        {
            warnings.push(format!(
                "Invalid github.api_url '{}': must start with http:// or https://",
                self.github.api_url
            ));
        }
        if let Some(owner) = &self.github.owner
            && !OWNER_REGEX.is_match(owner)
        {
            warnings.push(format!("Invalid github.owner '{}'", owner));
        }
        if let Some(repo) = &self.github.repo
            && (!REPO_REGEX.is_match(repo) || repo == "." || repo == "..")
        {
            warnings.push(format!("Invalid github.repo '{}'", repo));
        }
        if self.github.base.trim().is_empty() {
            warnings.push("github.base is empty".to_string());
        }
        if self.github.retries > 5 {
            warnings.push(format!(
                "github.retries = {} is high; each retry waits up to 1.5s",
                self.github.retries
            ));
        }
        if self.github.timeout_secs == 0 {
            warnings.push("github.timeout_secs must be greater than 0".to_string());
        }
        if self.limits.claim_per_minute == 0 {
            warnings.push("limits.claim_per_minute = 0 rejects every claim".to_string());
        }
        if self.limits.publish_per_minute == 0 {
            warnings.push("limits.publish_per_minute = 0 rejects every publish".to_string());
        }
        warnings
    }
}

/// Resolved configuration: file values with environment overrides applied.
#[derive(Debug, Clone)]
pub struct IdeaworksConfig {
    pub project_dir: PathBuf,
    pub config_dir: PathBuf,
    pub toml: IdeaworksToml,
    token: Option<String>,
}

impl IdeaworksConfig {
    /// Load from `project_dir` and the process environment.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR);
        let toml = IdeaworksToml::load_or_default(&config_dir)?;
        Ok(Self::from_parts(project_dir, toml, |key| std::env::var(key).ok()))
    }

    /// Build from an already parsed file and an environment lookup.
    pub fn from_parts<F>(project_dir: PathBuf, toml: IdeaworksToml, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_dir = project_dir.join(CONFIG_DIR);
        let mut config = Self {
            project_dir,
            config_dir,
            toml,
            token: None,
        };
        config.apply_env(env);
        config
    }

    fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let github = &mut self.toml.github;
        if let Some(owner) = var("GITHUB_OWNER") {
            github.owner = Some(owner);
        }
        if let Some(repo) = var("GITHUB_REPO") {
            github.repo = Some(repo);
        }
        if let Some(base) = var("GITHUB_BASE") {
            github.base = base;
        }
        if let Some(url) = var("GITHUB_API_URL") {
            github.api_url = url;
        }
        if let Some(db) = var("IDEAWORKS_DB") {
            self.toml.store.db_path = Some(db);
        }
        self.token = var("GITHUB_TOKEN");
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn db_path(&self) -> PathBuf {
        match &self.toml.store.db_path {
            Some(p) => {
                let path = PathBuf::from(p);
                if path.is_absolute() {
                    path
                } else {
                    self.project_dir.join(path)
                }
            }
            None => self.config_dir.join(DEFAULT_DB_FILE),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Settings for the hosting client. Fails naming every missing value.
    pub fn github_settings(&self) -> Result<GitHubSettings> {
        let github = &self.toml.github;
        let mut missing = Vec::new();
        if github.owner.is_none() {
            missing.push("GITHUB_OWNER");
        }
        if github.repo.is_none() {
            missing.push("GITHUB_REPO");
        }
        if self.token.is_none() {
            missing.push("GITHUB_TOKEN");
        }
        match (&github.owner, &github.repo, &self.token) {
            (Some(owner), Some(repo), Some(token)) => Ok(GitHubSettings {
                api_url: github.api_url.clone(),
                owner: owner.clone(),
                repo: repo.clone(),
                base_branch: github.base.clone(),
                token: token.clone(),
                retries: github.retries,
                timeout: Duration::from_secs(github.timeout_secs.max(1)),
            }),
            _ => anyhow::bail!("Missing GitHub configuration: {}", missing.join(", ")),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.toml.validate();
        match &self.token {
            Some(token) if !is_valid_github_token(token) => warnings.push(
                "GITHUB_TOKEN does not look like a GitHub token (expected a ghp_/github_pat_/gh*_ prefix)"
                    .to_string(),
            ),
            Some(_) => {}
            None => warnings.push("GITHUB_TOKEN is not set; claim and complete will fail".into()),
        }
        if self.toml.github.owner.is_none() || self.toml.github.repo.is_none() {
            warnings.push("GitHub owner/repo not configured; claim and complete will fail".into());
        }
        warnings
    }
}
