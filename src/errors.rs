//! Typed error hierarchy for ideaworks.
//!
//! Two top-level enums:
//! - `HostingError`: hosting API failures (transport, exhausted retries,
//!   unexpected status, undecodable payloads)
//! - `WorkflowError`: what a claim / complete / publish call hands back to its
//!   caller, with a stable machine code and HTTP status

use ideaworks_common::IdError;
use serde::Serialize;
use thiserror::Error;

/// Response bodies attached to errors are cut to this many characters.
pub const MAX_ERROR_BODY_CHARS: usize = 200;

/// Truncate a diagnostic body to [`MAX_ERROR_BODY_CHARS`] characters.
pub fn truncate_body(body: &str) -> String {
    body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// Errors from the hosting API layer.
#[derive(Debug, Error)]
pub enum HostingError {
    #[error("hosting request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("hosting API still failing after {attempts} attempts: {status} {body}")]
    RetriesExhausted { attempts: u32, status: u16, body: String },

    #[error("{step} failed: {status} {body}")]
    Status {
        step: &'static str,
        status: u16,
        body: String,
    },

    #[error("{step}: unexpected response: {message}")]
    Decode { step: &'static str, message: String },

    #[error("{step}: could not serialise: {message}")]
    Encode { step: &'static str, message: String },

    #[error("open pull request: none found for head {head} after create failed: {body}")]
    PullRequestNotFound { head: String, body: String },
}

impl HostingError {
    /// HTTP status of the failing response, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RetriesExhausted { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Decode { .. } | Self::Encode { .. } | Self::PullRequestNotFound { .. } => None,
        }
    }
}

/// Machine-readable error codes exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    RateLimited,
    StoreError,
    HostingError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::StoreError => "STORE_ERROR",
            Self::HostingError => "HOSTING_ERROR",
        }
    }
}

/// Errors returned by the workflows.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("idea store error: {0:#}")]
    Store(anyhow::Error),

    #[error(transparent)]
    Hosting(#[from] HostingError),
}

impl WorkflowError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::RateLimited(_) => ErrorCode::RateLimited,
            Self::Store(_) => ErrorCode::StoreError,
            Self::Hosting(_) => ErrorCode::HostingError,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::RateLimited(_) => 429,
            Self::Store(_) => 500,
            Self::Hosting(_) => 502,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            http_status: self.http_status(),
        }
    }
}

impl From<IdError> for WorkflowError {
    fn from(err: IdError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Serialisable error payload for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    pub http_status: u16,
}
