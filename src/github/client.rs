use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, HeaderMap, LINK, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ApiError;
use super::models::*;
use super::paging::ListRequest;
use crate::util::config::GithubConfig;

const API_VERSION: &str = "2022-11-28";

/// Pagination and rate-limit hints carried by a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMeta {
    /// Next page number from the `Link` header; 0 when there is none.
    pub next_page: u32,
    /// Next `after` cursor from the `Link` header.
    pub next_cursor: Option<String>,
    pub rate: RateLimit,
}

#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub value: T,
    pub meta: ResponseMeta,
}

#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    base: Url,
    token: String,
}

impl GithubClient {
    pub fn new(token: &str, cfg: &GithubConfig) -> Result<Self> {
        let base = Url::parse(&cfg.api_url)
            .with_context(|| format!("Invalid GitHub API URL: {}", cfg.api_url))?;
        let loopback = matches!(
            base.host_str(),
            Some("localhost") | Some("127.0.0.1") | Some("[::1]")
        );
        if base.scheme() != "https" && !(base.scheme() == "http" && loopback) {
            bail!("GitHub API URL must use HTTPS: {}", cfg.api_url);
        }
        if base.cannot_be_a_base() {
            bail!("GitHub API URL cannot be used as a base: {}", cfg.api_url);
        }

        let client = Client::builder()
            .user_agent(&cfg.user_agent)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base,
            token: token.to_string(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(String, String)],
    ) -> Result<ApiResponse<T>, ApiError> {
        let resp = self
            .client
            .get(url.clone())
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let rate = rate_limit_from_headers(&headers);

        if !status.is_success() {
            let retry_after = headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            // Primary limit: remaining hits 0. Secondary limit: Retry-After set.
            let throttled = status == StatusCode::FORBIDDEN
                && (retry_after.is_some()
                    || (headers.contains_key("x-ratelimit-remaining") && rate.remaining == 0));
            if status == StatusCode::TOO_MANY_REQUESTS || throttled {
                return Err(ApiError::RateLimited {
                    status,
                    retry_after,
                });
            }
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        let text = resp.text().await?;
        let value = serde_json::from_str(&text)?;
        let (next_page, next_cursor) = headers
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(parse_next_link)
            .unwrap_or((0, None));

        debug!(
            url = %url,
            next_page,
            next_cursor = next_cursor.as_deref().unwrap_or(""),
            remaining = rate.remaining,
            "GitHub GET complete"
        );

        Ok(ApiResponse {
            value,
            meta: ResponseMeta {
                next_page,
                next_cursor,
                rate,
            },
        })
    }

    pub async fn list_pulls(
        &self,
        org: &str,
        project: &str,
        req: ListRequest,
    ) -> Result<ApiResponse<Vec<RemotePullRequest>>, ApiError> {
        let url = self.endpoint(&["repos", org, project, "pulls"]);
        self.get_json(url, &req.query_pairs()).await
    }

    pub async fn get_pull(
        &self,
        org: &str,
        project: &str,
        number: u64,
    ) -> Result<ApiResponse<RemotePullRequest>, ApiError> {
        let number = number.to_string();
        let url = self.endpoint(&["repos", org, project, "pulls", &number]);
        self.get_json(url, &[]).await
    }

    pub async fn list_pull_files(
        &self,
        org: &str,
        project: &str,
        number: u64,
        req: ListRequest,
    ) -> Result<ApiResponse<Vec<CommitFile>>, ApiError> {
        let number = number.to_string();
        let url = self.endpoint(&["repos", org, project, "pulls", &number, "files"]);
        self.get_json(url, &req.query_pairs()).await
    }

    pub async fn list_pull_comments(
        &self,
        org: &str,
        project: &str,
        number: u64,
        req: ListRequest,
    ) -> Result<ApiResponse<Vec<PullRequestComment>>, ApiError> {
        let number = number.to_string();
        let url = self.endpoint(&["repos", org, project, "pulls", &number, "comments"]);
        self.get_json(url, &req.query_pairs()).await
    }

    pub async fn list_reviews(
        &self,
        org: &str,
        project: &str,
        number: u64,
        req: ListRequest,
    ) -> Result<ApiResponse<Vec<Review>>, ApiError> {
        let number = number.to_string();
        let url = self.endpoint(&["repos", org, project, "pulls", &number, "reviews"]);
        self.get_json(url, &req.query_pairs()).await
    }

    pub async fn list_issues(
        &self,
        org: &str,
        project: &str,
        req: ListRequest,
    ) -> Result<ApiResponse<Vec<RemoteIssue>>, ApiError> {
        let url = self.endpoint(&["repos", org, project, "issues"]);
        self.get_json(url, &req.query_pairs()).await
    }

    pub async fn get_issue(
        &self,
        org: &str,
        project: &str,
        number: u64,
    ) -> Result<ApiResponse<RemoteIssue>, ApiError> {
        let number = number.to_string();
        let url = self.endpoint(&["repos", org, project, "issues", &number]);
        self.get_json(url, &[]).await
    }

    pub async fn list_issue_comments(
        &self,
        org: &str,
        project: &str,
        number: u64,
        req: ListRequest,
    ) -> Result<ApiResponse<Vec<IssueComment>>, ApiError> {
        let number = number.to_string();
        let url = self.endpoint(&["repos", org, project, "issues", &number, "comments"]);
        self.get_json(url, &req.query_pairs()).await
    }

    pub async fn list_org_repos(
        &self,
        org: &str,
        req: ListRequest,
    ) -> Result<ApiResponse<Vec<RemoteRepository>>, ApiError> {
        let url = self.endpoint(&["orgs", org, "repos"]);
        self.get_json(url, &req.query_pairs()).await
    }
}

/// Extract the next page number and `after` cursor from a `Link` header.
/// Returns `(0, None)` when there is no `rel="next"` entry.
pub fn parse_next_link(link: &str) -> (u32, Option<String>) {
    for part in link.split(',') {
        let mut pieces = part.split(';');
        let Some(target) = pieces.next() else {
            continue;
        };
        if !pieces.any(|p| p.trim() == "rel=\"next\"") {
            continue;
        }
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');
        let Ok(url) = Url::parse(target) else {
            continue;
        };

        let mut page = 0;
        let mut after = None;
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "page" => page = v.parse().unwrap_or(0),
                "after" if !v.is_empty() => after = Some(v.into_owned()),
                _ => {}
            }
        }
        return (page, after);
    }
    (0, None)
}

pub fn rate_limit_from_headers(headers: &HeaderMap) -> RateLimit {
    let number = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<i64>().ok())
    };
    RateLimit {
        remaining: number("x-ratelimit-remaining").unwrap_or(0).max(0) as u32,
        limit: number("x-ratelimit-limit").unwrap_or(0).max(0) as u32,
        reset_at: number("x-ratelimit-reset").and_then(|epoch| DateTime::<Utc>::from_timestamp(epoch, 0)),
    }
}
