use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::filter::{UserFilter, Window, is_bot};
use super::{Scope, keep};
use crate::github::models::{RemoteIssue, RemoteUser};
use crate::github::paging::{CursorPaginator, ListQuery, Listing, collect_pages};
use crate::github::{Fetcher, PipelineError};
use crate::util::time::format_date;

/// One commenter's activity on one issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentSummary {
    pub url: String,
    pub date: String,
    pub project: String,
    pub commenter: String,
    pub issue_author: String,
    pub comments: u32,
    pub words: u32,
}

/// A comment-like record reduced to what the tally needs.
struct Remark<'a> {
    user: Option<&'a RemoteUser>,
    body: Option<&'a str>,
    at: Option<DateTime<Utc>>,
}

/// Per-commenter activity, in order of first appearance.
fn group_remarks<'a>(
    issue: &RemoteIssue,
    project: &str,
    remarks: impl IntoIterator<Item = Remark<'a>>,
    window: &Window,
    users: &UserFilter,
) -> Vec<CommentSummary> {
    let mut out: Vec<(DateTime<Utc>, CommentSummary)> = Vec::new();

    for remark in remarks {
        let Some(at) = remark.at.filter(|t| window.contains(*t)) else {
            continue;
        };
        let Some(user) = remark.user else {
            continue;
        };
        if is_bot(Some(user)) || !users.matches(&user.login) {
            continue;
        }
        let words = remark
            .body
            .map(|b| b.split_whitespace().count() as u32)
            .unwrap_or(0);

        match out.iter_mut().find(|(_, s)| s.commenter == user.login) {
            Some((latest, summary)) => {
                summary.comments += 1;
                summary.words += words;
                if at > *latest {
                    *latest = at;
                    summary.date = format_date(&at);
                }
            }
            None => out.push((
                at,
                CommentSummary {
                    url: issue.html_url.clone(),
                    date: format_date(&at),
                    project: project.to_string(),
                    commenter: user.login.clone(),
                    issue_author: issue.author().to_string(),
                    comments: 1,
                    words,
                },
            )),
        }
    }

    out.into_iter().map(|(_, s)| s).collect()
}

/// Comment activity inside `window` on issues and pull requests updated
/// since the window opened. Pull requests also count review comments and
/// non-empty review bodies.
pub async fn comment_summaries(
    fetcher: &Fetcher,
    org: &str,
    project: &str,
    window: &Window,
    users: &UserFilter,
) -> Result<Vec<CommentSummary>, PipelineError> {
    let scope = Scope::new("comment", org, project);
    let query = ListQuery::new(fetcher.issue_per_page())
        .state("all")
        .sort("updated", "desc")
        .since(window.since);

    info!(org, project, since = %window.since, until = %window.until, "Gathering comments");
    let listed = collect_pages::<CursorPaginator, _, _, _>(
        fetcher.cancel(),
        fetcher.policy(),
        Listing::repo("issue-all", "Issues.ListByRepo", org, project),
        &query,
        |req| fetcher.client().list_issues(org, project, req),
    )
    .await
    .map_err(|e| scope.listing_failed(e))?;

    let mut result = Vec::new();
    for issue in listed {
        if window.is_before(issue.updated_at) {
            debug!(number = issue.number, "Issue updated before window; stopping");
            break;
        }
        if issue.comments == 0 && !issue.is_pull_request() {
            debug!(number = issue.number, "Skipping issue: no comments");
            continue;
        }

        let as_of = issue.activity_time();
        let comments = match fetcher.issue_comments(as_of, org, project, issue.number).await {
            Ok(fetched) => keep(fetched, &scope, issue.number),
            Err(e) => {
                scope.item_failed(issue.number, "issue comments", e)?;
                continue;
            }
        };

        let (review_comments, reviews) = if issue.is_pull_request() {
            let review_comments = match fetcher
                .pull_request_comments(as_of, org, project, issue.number)
                .await
            {
                Ok(fetched) => keep(fetched, &scope, issue.number),
                Err(e) => {
                    scope.item_failed(issue.number, "review comments", e)?;
                    continue;
                }
            };
            let reviews = match fetcher.reviews(as_of, org, project, issue.number).await {
                Ok(fetched) => keep(fetched, &scope, issue.number),
                Err(e) => {
                    scope.item_failed(issue.number, "reviews", e)?;
                    continue;
                }
            };
            (review_comments, reviews)
        } else {
            (Vec::new(), Vec::new())
        };

        let mut remarks: Vec<Remark<'_>> = comments
            .iter()
            .map(|c| Remark {
                user: c.user.as_ref(),
                body: c.body.as_deref(),
                at: Some(c.created_at),
            })
            .collect();
        remarks.extend(review_comments.iter().map(|c| Remark {
            user: c.user.as_ref(),
            body: c.body.as_deref(),
            at: Some(c.created_at),
        }));
        remarks.extend(
            reviews
                .iter()
                .filter(|r| r.body.as_deref().is_some_and(|b| !b.trim().is_empty()))
                .map(|r| Remark {
                    user: r.user.as_ref(),
                    body: r.body.as_deref(),
                    at: r.submitted_at,
                }),
        );

        result.extend(group_remarks(&issue, project, remarks, window, users));
    }

    info!(org, project, count = result.len(), "Comment summaries after filters");
    Ok(result)
}
