use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::filter::{UserFilter, Window, is_bot};
use super::{Scope, keep};
use crate::github::models::RemoteIssue;
use crate::github::paging::{CursorPaginator, ListQuery, Listing, collect_pages};
use crate::github::{Fetcher, PipelineError};
use crate::util::time::format_date;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub url: String,
    pub date: String,
    pub author: String,
    pub closer: String,
    pub project: String,
    pub title: String,
}

impl IssueSummary {
    fn from_issue(issue: &RemoteIssue, project: &str) -> Self {
        Self {
            url: issue.html_url.clone(),
            date: format_date(&issue.activity_time()),
            author: issue.author().to_string(),
            closer: issue.closer().unwrap_or("").to_string(),
            project: project.to_string(),
            title: issue.title.clone(),
        }
    }
}

/// Issues (not pull requests) closed in `org/project` within `window`.
pub async fn closed_issues(
    fetcher: &Fetcher,
    org: &str,
    project: &str,
    window: &Window,
    users: &UserFilter,
) -> Result<Vec<IssueSummary>, PipelineError> {
    let scope = Scope::new("issue", org, project);
    let query = ListQuery::new(fetcher.issue_per_page())
        .state("closed")
        .sort("updated", "desc");

    info!(org, project, since = %window.since, until = %window.until, "Gathering issues");
    let listed = collect_pages::<CursorPaginator, _, _, _>(
        fetcher.cancel(),
        fetcher.policy(),
        Listing::repo("issue", "Issues.ListByRepo", org, project),
        &query,
        |req| fetcher.client().list_issues(org, project, req),
    )
    .await
    .map_err(|e| scope.listing_failed(e))?;

    info!(org, project, count = listed.len(), "Fetched issues; applying filters");

    let mut result = Vec::new();
    for issue in listed {
        if issue.is_pull_request() {
            debug!(number = issue.number, "Skipping issue: it is a pull request");
            continue;
        }

        if window.is_before(issue.updated_at) {
            debug!(
                number = issue.number,
                updated = %format_date(&issue.updated_at),
                "Issue updated before window; stopping"
            );
            break;
        }

        let Some(closed_at) = issue.closed_at else {
            debug!(number = issue.number, "Skipping issue: no close time");
            continue;
        };
        if !window.contains(closed_at) {
            debug!(
                number = issue.number,
                closed = %format_date(&closed_at),
                "Skipping issue: closed outside window"
            );
            continue;
        }
        if issue.state != "closed" {
            debug!(number = issue.number, state = %issue.state, "Skipping issue: not closed");
            continue;
        }
        if is_bot(issue.user.as_ref()) {
            debug!(number = issue.number, author = issue.author(), "Skipping issue: bot author");
            continue;
        }

        let full = match fetcher
            .issue(issue.activity_time(), org, project, issue.number)
            .await
        {
            Ok(fetched) => keep(fetched, &scope, issue.number),
            Err(e) => {
                scope.item_failed(issue.number, "issue detail", e)?;
                continue;
            }
        };

        // closed_by is only present on the detail record.
        if !users.matches_any([Some(full.author()), full.closer()]) {
            debug!(
                number = full.number,
                author = full.author(),
                closer = full.closer().unwrap_or(""),
                "Skipping issue: neither author nor closer in user list"
            );
            continue;
        }

        info!(
            number = full.number,
            author = full.author(),
            closer = full.closer().unwrap_or(""),
            closed = %format_date(&full.activity_time()),
            "Including issue"
        );
        result.push(IssueSummary::from_issue(&full, project));
    }

    info!(org, project, count = result.len(), "Issues after filters");
    Ok(result)
}
