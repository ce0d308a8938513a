//! Draining paginated listing endpoints.
//!
//! GitHub exposes two pagination idioms: a 1-based page number, and an opaque
//! `after` cursor. A [`Paginator`] implementation is chosen per endpoint at the
//! call site, and [`collect_pages`] drives either one through the retrying
//! executor, preserving server order across pages.

use std::fmt;
use std::future::Future;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{ApiResponse, ResponseMeta};
use super::error::{ApiError, FetchError};
use super::retry::{RetryPolicy, retry_call};
use crate::cache::CacheKey;

/// Query parameters for a listing call. Filters are passed through to the
/// server as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub state: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub per_page: u32,
    pub since: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
    pub mentioned: Option<String>,
    pub creator: Option<String>,
    pub repo_type: Option<String>,
}

impl ListQuery {
    pub fn new(per_page: u32) -> Self {
        Self {
            per_page,
            ..Self::default()
        }
    }

    pub fn state(mut self, state: &str) -> Self {
        self.state = Some(state.to_string());
        self
    }

    pub fn sort(mut self, field: &str, direction: &str) -> Self {
        self.sort = Some(field.to_string());
        self.direction = Some(direction.to_string());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Stable description of every parameter, used in listing cache keys.
    pub fn signature(&self) -> String {
        format!(
            "state={}-sort={}-dir={}-since={}-labels={}-assignee={}-mentioned={}-creator={}-type={}-perpage={}",
            self.state.as_deref().unwrap_or(""),
            self.sort.as_deref().unwrap_or(""),
            self.direction.as_deref().unwrap_or(""),
            self.since
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
            self.labels.join(","),
            self.assignee.as_deref().unwrap_or(""),
            self.mentioned.as_deref().unwrap_or(""),
            self.creator.as_deref().unwrap_or(""),
            self.repo_type.as_deref().unwrap_or(""),
            self.per_page,
        )
    }

    fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut push = |k: &str, v: Option<&str>| {
            if let Some(v) = v.filter(|v| !v.is_empty()) {
                pairs.push((k.to_string(), v.to_string()));
            }
        };
        push("state", self.state.as_deref());
        push("sort", self.sort.as_deref());
        push("direction", self.direction.as_deref());
        push("assignee", self.assignee.as_deref());
        push("mentioned", self.mentioned.as_deref());
        push("creator", self.creator.as_deref());
        push("type", self.repo_type.as_deref());
        if !self.labels.is_empty() {
            pairs.push(("labels".to_string(), self.labels.join(",")));
        }
        if let Some(since) = self.since {
            pairs.push((
                "since".to_string(),
                since.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        if self.per_page > 0 {
            pairs.push(("per_page".to_string(), self.per_page.to_string()));
        }
        pairs
    }
}

/// Where a listing request starts. Page numbers and cursors never mix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagePosition {
    /// 1-based page number.
    Page(u32),
    /// First cursor request: the leading window of `n` items.
    First(u32),
    /// Subsequent cursor request.
    After(String),
}

impl PagePosition {
    fn key_part(&self) -> String {
        match self {
            PagePosition::Page(n) => format!("page{n}"),
            PagePosition::First(n) => format!("first-{n}"),
            PagePosition::After(token) => format!("after-{token}"),
        }
    }
}

impl fmt::Display for PagePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagePosition::Page(n) => write!(f, "page {n}"),
            PagePosition::First(n) => write!(f, "first {n}"),
            PagePosition::After(token) => write!(f, "after {token}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub query: ListQuery,
    pub position: PagePosition,
}

impl ListRequest {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self.query.pairs();
        match &self.position {
            PagePosition::Page(n) => pairs.push(("page".to_string(), n.to_string())),
            PagePosition::First(n) => pairs.push(("first".to_string(), n.to_string())),
            PagePosition::After(token) => pairs.push(("after".to_string(), token.clone())),
        }
        pairs
    }

    pub fn key_part(&self) -> String {
        self.position.key_part()
    }
}

/// One pagination idiom: where to start, and how to move on after a page.
pub trait Paginator: Sized {
    fn start(per_page: u32) -> Self;

    fn position(&self) -> PagePosition;

    /// The next position, or `None` when the listing is complete.
    fn advance(self, page_len: usize, meta: &ResponseMeta) -> Option<Self>;
}

/// Page-number pagination. Done on an empty page or when no next page is
/// advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetPaginator {
    page: u32,
}

impl Paginator for OffsetPaginator {
    fn start(_per_page: u32) -> Self {
        Self { page: 1 }
    }

    fn position(&self) -> PagePosition {
        PagePosition::Page(self.page)
    }

    fn advance(self, page_len: usize, meta: &ResponseMeta) -> Option<Self> {
        if page_len == 0 || meta.next_page == 0 {
            return None;
        }
        if meta.next_page <= self.page {
            warn!(
                page = self.page,
                next_page = meta.next_page,
                "Server advertised a non-advancing next page; stopping"
            );
            return None;
        }
        Some(Self {
            page: meta.next_page,
        })
    }
}

/// Cursor pagination. Done only when the server stops returning a cursor;
/// an empty page with a cursor keeps going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPaginator {
    per_page: u32,
    after: Option<String>,
}

impl Paginator for CursorPaginator {
    fn start(per_page: u32) -> Self {
        Self {
            per_page,
            after: None,
        }
    }

    fn position(&self) -> PagePosition {
        match &self.after {
            Some(token) => PagePosition::After(token.clone()),
            None => PagePosition::First(self.per_page),
        }
    }

    fn advance(self, _page_len: usize, meta: &ResponseMeta) -> Option<Self> {
        let next = meta.next_cursor.as_deref().filter(|t| !t.is_empty())?;
        if self.after.as_deref() == Some(next) {
            warn!(cursor = next, "Server repeated the same cursor; stopping");
            return None;
        }
        Some(Self {
            per_page: self.per_page,
            after: Some(next.to_string()),
        })
    }
}

/// What is being listed, for keys and log lines.
#[derive(Debug, Clone, Copy)]
pub struct Listing<'a> {
    pub kind: &'a str,
    pub endpoint: &'a str,
    pub org: &'a str,
    pub project: &'a str,
    /// Set when listing a sub-collection of one issue or pull request.
    pub number: Option<u64>,
}

impl<'a> Listing<'a> {
    pub fn repo(kind: &'a str, endpoint: &'a str, org: &'a str, project: &'a str) -> Self {
        Self {
            kind,
            endpoint,
            org,
            project,
            number: None,
        }
    }

    pub fn of_entity(mut self, number: u64) -> Self {
        self.number = Some(number);
        self
    }

    fn key_target(&self) -> String {
        let mut target = self.org.to_string();
        if !self.project.is_empty() {
            target.push('-');
            target.push_str(self.project);
        }
        if let Some(n) = self.number {
            target.push_str(&format!("-{n}"));
        }
        target
    }

    fn describe(&self, req: &ListRequest) -> String {
        let q = &req.query;
        let mut target = self.org.to_string();
        if !self.project.is_empty() {
            target.push('/');
            target.push_str(self.project);
        }
        if let Some(n) = self.number {
            target.push_str(&format!("#{n}"));
        }
        format!(
            "{} {} for {} (State: {}, Sort: {}, Direction: {}, PerPage: {})",
            self.endpoint,
            req.position,
            target,
            q.state.as_deref().unwrap_or(""),
            q.sort.as_deref().unwrap_or(""),
            q.direction.as_deref().unwrap_or(""),
            q.per_page,
        )
    }
}

/// Fetch every page of a listing. Each page goes through [`retry_call`]
/// individually; any page failure discards everything collected so far.
pub async fn collect_pages<P, T, F, Fut>(
    cancel: &CancellationToken,
    policy: &RetryPolicy,
    listing: Listing<'_>,
    query: &ListQuery,
    mut fetch: F,
) -> Result<Vec<T>, FetchError>
where
    P: Paginator,
    F: FnMut(ListRequest) -> Fut,
    Fut: Future<Output = Result<ApiResponse<Vec<T>>, ApiError>>,
{
    let mut items = Vec::new();
    let mut pages: u32 = 0;
    let mut cursor = P::start(query.per_page);

    loop {
        let request = ListRequest {
            query: query.clone(),
            position: cursor.position(),
        };
        let key = CacheKey::listing(listing.kind, &listing.key_target(), &request);
        let call_desc = listing.describe(&request);
        info!("{}", call_desc);

        let response = retry_call(cancel, policy, key.as_str(), &call_desc, || {
            fetch(request.clone())
        })
        .await?;
        pages += 1;

        let page_len = response.value.len();
        items.extend(response.value);

        match cursor.advance(page_len, &response.meta) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    debug!(
        kind = listing.kind,
        org = listing.org,
        project = listing.project,
        pages,
        count = items.len(),
        "Listing complete"
    );
    Ok(items)
}
