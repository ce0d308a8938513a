use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single remote call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate limited by GitHub (status {status})")]
    RateLimited {
        status: StatusCode,
        retry_after: Option<Duration>,
    },

    #[error("GitHub API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) | ApiError::RateLimited { .. } => true,
            ApiError::Status { status, .. } => status.is_server_error(),
            ApiError::Decode(_) => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Failure of a call driven by the retrying executor.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{call} after {attempts} attempts: {source}")]
    Exhausted {
        call: String,
        attempts: u32,
        #[source]
        source: ApiError,
    },

    #[error("{call}: {source}")]
    Fatal {
        call: String,
        #[source]
        source: ApiError,
    },

    #[error("{call}: cancelled")]
    Cancelled { call: String },
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled { .. })
    }
}

/// Failure of a whole pipeline call. Per-item failures are logged and
/// skipped instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch {kind} list for {org}/{project}: {source}")]
    Listing {
        kind: &'static str,
        org: String,
        project: String,
        #[source]
        source: FetchError,
    },

    #[error("{kind} pipeline for {org}/{project} cancelled")]
    Cancelled {
        kind: &'static str,
        org: String,
        project: String,
    },
}
