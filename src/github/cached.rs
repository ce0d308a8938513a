//! Fetch-or-cache helpers for per-entity detail.
//!
//! Each helper looks the entity up in the shared [`Cacher`] first, keyed by
//! its identity and the caller's `as_of` timestamp. On a miss it goes to the
//! network through the retrying executor and writes the result back.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::GithubClient;
use super::error::FetchError;
use super::models::{
    CommitFile, IssueComment, PullRequestComment, RemoteIssue, RemotePullRequest, Review,
};
use super::paging::{ListQuery, Listing, OffsetPaginator, collect_pages};
use super::retry::{RetryPolicy, retry_call};
use crate::cache::{CacheKey, Cacheable, Cacher};

/// A fetched value plus how it was obtained.
///
/// A failed cache write does not invalidate `value`; it is reported in
/// `write_error` for the caller to log.
#[derive(Debug)]
pub struct Fetched<T> {
    pub value: T,
    pub from_cache: bool,
    pub write_error: Option<anyhow::Error>,
}

/// Everything a pipeline needs to talk to GitHub: the client, the shared
/// cache, the retry policy, and the cancellation token for the run.
#[derive(Clone)]
pub struct Fetcher {
    client: GithubClient,
    cache: Arc<dyn Cacher>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    per_page: u32,
    issue_per_page: u32,
}

impl Fetcher {
    pub fn new(
        client: GithubClient,
        cache: Arc<dyn Cacher>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            cache,
            policy,
            cancel,
            per_page: 100,
            issue_per_page: 50,
        }
    }

    pub fn with_page_sizes(mut self, per_page: u32, issue_per_page: u32) -> Self {
        self.per_page = per_page;
        self.issue_per_page = issue_per_page;
        self
    }

    pub fn client(&self) -> &GithubClient {
        &self.client
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn issue_per_page(&self) -> u32 {
        self.issue_per_page
    }

    async fn fetch_or_cache<T, F, Fut>(
        &self,
        as_of: DateTime<Utc>,
        org: &str,
        project: &str,
        number: u64,
        fetch: F,
    ) -> Result<Fetched<T>, FetchError>
    where
        T: Cacheable + Clone,
        F: FnOnce(CacheKey) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let key = CacheKey::entity(T::KIND, org, project, number);
        if let Some(entry) = self.cache.get(key.as_str(), as_of) {
            match T::from_entry(entry) {
                Some(value) => {
                    debug!(key = %key, "cache hit");
                    return Ok(Fetched {
                        value,
                        from_cache: true,
                        write_error: None,
                    });
                }
                None => warn!(key = %key, "Cached entry has an unexpected kind; refetching"),
            }
        }

        info!(key = %key, "cache miss");
        let value = fetch(key.clone()).await?;
        let write_error = self.cache.set(key.as_str(), &value.clone().into_entry()).err();
        Ok(Fetched {
            value,
            from_cache: false,
            write_error,
        })
    }

    pub async fn pull_request(
        &self,
        as_of: DateTime<Utc>,
        org: &str,
        project: &str,
        number: u64,
    ) -> Result<Fetched<RemotePullRequest>, FetchError> {
        self.fetch_or_cache(as_of, org, project, number, |key| async move {
            let call_desc = format!("PullRequests.Get {org}/{project}#{number}");
            let resp = retry_call(&self.cancel, &self.policy, key.as_str(), &call_desc, || {
                self.client.get_pull(org, project, number)
            })
            .await?;
            Ok(resp.value)
        })
        .await
    }

    pub async fn pull_request_files(
        &self,
        as_of: DateTime<Utc>,
        org: &str,
        project: &str,
        number: u64,
    ) -> Result<Fetched<Vec<CommitFile>>, FetchError> {
        self.fetch_or_cache(as_of, org, project, number, |_| async move {
            collect_pages::<OffsetPaginator, _, _, _>(
                &self.cancel,
                &self.policy,
                Listing::repo("pr-listfiles", "PullRequests.ListFiles", org, project)
                    .of_entity(number),
                &ListQuery::new(self.per_page),
                |req| self.client.list_pull_files(org, project, number, req),
            )
            .await
        })
        .await
    }

    pub async fn pull_request_comments(
        &self,
        as_of: DateTime<Utc>,
        org: &str,
        project: &str,
        number: u64,
    ) -> Result<Fetched<Vec<PullRequestComment>>, FetchError> {
        self.fetch_or_cache(as_of, org, project, number, |_| async move {
            collect_pages::<OffsetPaginator, _, _, _>(
                &self.cancel,
                &self.policy,
                Listing::repo("pr-comments", "PullRequests.ListComments", org, project)
                    .of_entity(number),
                &ListQuery::new(self.per_page),
                |req| self.client.list_pull_comments(org, project, number, req),
            )
            .await
        })
        .await
    }

    pub async fn reviews(
        &self,
        as_of: DateTime<Utc>,
        org: &str,
        project: &str,
        number: u64,
    ) -> Result<Fetched<Vec<Review>>, FetchError> {
        self.fetch_or_cache(as_of, org, project, number, |_| async move {
            collect_pages::<OffsetPaginator, _, _, _>(
                &self.cancel,
                &self.policy,
                Listing::repo("review", "PullRequests.ListReviews", org, project)
                    .of_entity(number),
                &ListQuery::new(self.per_page),
                |req| self.client.list_reviews(org, project, number, req),
            )
            .await
        })
        .await
    }

    pub async fn issue(
        &self,
        as_of: DateTime<Utc>,
        org: &str,
        project: &str,
        number: u64,
    ) -> Result<Fetched<RemoteIssue>, FetchError> {
        self.fetch_or_cache(as_of, org, project, number, |key| async move {
            let call_desc = format!("Issues.Get {org}/{project}#{number}");
            let resp = retry_call(&self.cancel, &self.policy, key.as_str(), &call_desc, || {
                self.client.get_issue(org, project, number)
            })
            .await?;
            Ok(resp.value)
        })
        .await
    }

    pub async fn issue_comments(
        &self,
        as_of: DateTime<Utc>,
        org: &str,
        project: &str,
        number: u64,
    ) -> Result<Fetched<Vec<IssueComment>>, FetchError> {
        self.fetch_or_cache(as_of, org, project, number, |_| async move {
            collect_pages::<OffsetPaginator, _, _, _>(
                &self.cancel,
                &self.policy,
                Listing::repo("issue-comments", "Issues.ListComments", org, project)
                    .of_entity(number),
                &ListQuery::new(self.per_page),
                |req| self.client.list_issue_comments(org, project, number, req),
            )
            .await
        })
        .await
    }
}
