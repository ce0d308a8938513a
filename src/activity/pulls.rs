use tracing::{debug, info, warn};

use super::filter::{BranchFilter, UserFilter, Window, is_bot};
use super::{Scope, keep};
use crate::github::models::{CommitFile, RemotePullRequest};
use crate::github::paging::{ListQuery, Listing, OffsetPaginator, collect_pages};
use crate::github::{Fetcher, PipelineError};
use crate::summary::{PullRequestSummary, SummaryRules, summarize_pulls};
use crate::util::time::format_date;

/// Pull requests merged into `org/project` within `window`, as full detail
/// records, in listing order.
pub async fn merged_pulls(
    fetcher: &Fetcher,
    org: &str,
    project: &str,
    window: &Window,
    users: &UserFilter,
    branches: &BranchFilter,
) -> Result<Vec<RemotePullRequest>, PipelineError> {
    let scope = Scope::new("pull request", org, project);
    let query = ListQuery::new(fetcher.per_page())
        .state("closed")
        .sort("updated", "desc");

    info!(org, project, since = %window.since, until = %window.until, "Gathering pull requests");
    let listed = collect_pages::<OffsetPaginator, _, _, _>(
        fetcher.cancel(),
        fetcher.policy(),
        Listing::repo("pr", "PullRequests.List", org, project),
        &query,
        |req| fetcher.client().list_pulls(org, project, req),
    )
    .await
    .map_err(|e| scope.listing_failed(e))?;

    info!(org, project, count = listed.len(), "Fetched pull requests; applying filters");

    let mut result = Vec::new();
    for pr in listed {
        if window.is_before(pr.updated_at) {
            debug!(
                number = pr.number,
                updated = %format_date(&pr.updated_at),
                "Pull request updated before window; stopping"
            );
            break;
        }

        if pr.state != "closed" {
            debug!(number = pr.number, state = %pr.state, "Skipping pull request: not closed");
            continue;
        }
        let Some(closed_at) = pr.closed_at else {
            debug!(number = pr.number, "Skipping pull request: no close time");
            continue;
        };
        if !window.contains(closed_at) {
            debug!(
                number = pr.number,
                closed = %format_date(&closed_at),
                "Skipping pull request: closed outside window"
            );
            continue;
        }

        if is_bot(pr.user.as_ref()) {
            debug!(number = pr.number, author = pr.author(), "Skipping pull request: bot author");
            continue;
        }

        let full = match fetcher
            .pull_request(pr.terminal_time(), org, project, pr.number)
            .await
        {
            Ok(fetched) => keep(fetched, &scope, pr.number),
            Err(e) => {
                scope.item_failed(pr.number, "pull request detail", e)?;
                continue;
            }
        };

        if !full.merged || full.merge_commit_sha.as_deref().unwrap_or("").is_empty() {
            debug!(number = full.number, "Skipping pull request: not merged");
            continue;
        }
        // The list endpoint omits merged_by, so identity waits for the detail record.
        if !users.matches_any([Some(full.author()), full.merger()]) {
            debug!(
                number = full.number,
                author = full.author(),
                merger = full.merger().unwrap_or(""),
                "Skipping pull request: neither author nor merger in user list"
            );
            continue;
        }
        if !branches.matches(full.base_branch()) {
            debug!(
                number = full.number,
                branch = full.base_branch(),
                "Skipping pull request: base branch not in list"
            );
            continue;
        }
        let Some(merged_at) = full.merged_at else {
            warn!(number = full.number, "Pull request marked merged without a merge time; skipping");
            continue;
        };
        if !window.contains(merged_at) {
            debug!(
                number = full.number,
                merged = %format_date(&merged_at),
                "Skipping pull request: merged outside window"
            );
            continue;
        }

        info!(
            number = full.number,
            author = full.author(),
            branch = full.base_branch(),
            merged = %format_date(&merged_at),
            "Including pull request"
        );
        result.push(full);
    }

    info!(org, project, count = result.len(), "Pull requests after filters");
    Ok(result)
}

/// Merged pull requests in `window`, summarized with their file changes.
pub async fn list_merged_pull_requests(
    fetcher: &Fetcher,
    org: &str,
    project: &str,
    window: &Window,
    users: &UserFilter,
    branches: &BranchFilter,
    rules: &SummaryRules,
) -> Result<Vec<PullRequestSummary>, PipelineError> {
    let scope = Scope::new("pull request", org, project);
    let merged = merged_pulls(fetcher, org, project, window, users, branches).await?;

    let mut batch: Vec<(RemotePullRequest, Vec<CommitFile>)> = Vec::with_capacity(merged.len());
    for pr in merged {
        match fetcher
            .pull_request_files(pr.terminal_time(), org, project, pr.number)
            .await
        {
            Ok(fetched) => {
                let files = keep(fetched, &scope, pr.number);
                batch.push((pr, files));
            }
            Err(e) => scope.item_failed(pr.number, "pull request files", e)?,
        }
    }

    Ok(summarize_pulls(&batch, window, rules))
}
