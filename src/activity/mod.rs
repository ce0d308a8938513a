//! Filter pipelines that turn repository listings into report rows.
//!
//! Every pipeline lists candidates sorted by last update descending, stops
//! at the first candidate updated before the window, filters the rest, and
//! fetches per-item detail through the [`Fetcher`](crate::github::Fetcher)
//! cache. A listing failure fails the whole call; a detail failure skips
//! only that item.

pub mod comments;
pub mod filter;
pub mod issues;
pub mod pulls;
pub mod repos;
pub mod tally;

pub use comments::{CommentSummary, comment_summaries};
pub use filter::{AllowList, BranchFilter, RepoFilter, UserFilter, Window, is_bot, is_bot_login};
pub use issues::{IssueSummary, closed_issues};
pub use pulls::{list_merged_pull_requests, merged_pulls};
pub use repos::list_repo_names;
pub use tally::{
    TallyItem, comment_words_tally, comments_tally, issue_closer_tally, issue_opener_tally,
};

use tracing::warn;

use crate::github::{FetchError, Fetched, PipelineError};

/// Which pipeline is running where, for errors and log lines.
#[derive(Debug, Clone, Copy)]
struct Scope<'a> {
    kind: &'static str,
    org: &'a str,
    project: &'a str,
}

impl<'a> Scope<'a> {
    fn new(kind: &'static str, org: &'a str, project: &'a str) -> Self {
        Self { kind, org, project }
    }

    fn cancelled(&self) -> PipelineError {
        PipelineError::Cancelled {
            kind: self.kind,
            org: self.org.to_string(),
            project: self.project.to_string(),
        }
    }

    fn listing_failed(&self, source: FetchError) -> PipelineError {
        if source.is_cancelled() {
            return self.cancelled();
        }
        PipelineError::Listing {
            kind: self.kind,
            org: self.org.to_string(),
            project: self.project.to_string(),
            source,
        }
    }

    /// Log a per-item failure so the caller can skip it. Cancellation is
    /// the one failure that stops the pipeline.
    fn item_failed(&self, number: u64, what: &str, err: FetchError) -> Result<(), PipelineError> {
        if err.is_cancelled() {
            return Err(self.cancelled());
        }
        warn!(
            org = self.org,
            project = self.project,
            number,
            error = %err,
            "Failed to get {what}; skipping"
        );
        Ok(())
    }
}

/// Unwrap a fetch, logging a failed cache write. The value is still used.
fn keep<T>(fetched: Fetched<T>, scope: &Scope<'_>, number: u64) -> T {
    if let Some(err) = &fetched.write_error {
        warn!(
            org = scope.org,
            project = scope.project,
            number,
            error = %err,
            "Failed to cache fetched {}; continuing with fetched value",
            scope.kind
        );
    }
    fetched.value
}
