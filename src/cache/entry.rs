use std::fmt;

use serde::{Deserialize, Serialize};

use crate::github::models::{
    CommitFile, IssueComment, PullRequestComment, RemoteIssue, RemotePullRequest, Review,
};
use crate::github::paging::ListRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    PullRequest,
    PullRequestFiles,
    PullRequestComments,
    Reviews,
    Issue,
    IssueComments,
}

impl EntityKind {
    pub fn prefix(self) -> &'static str {
        match self {
            EntityKind::PullRequest => "pr",
            EntityKind::PullRequestFiles => "pr-listfiles",
            EntityKind::PullRequestComments => "pr-comments",
            EntityKind::Reviews => "review",
            EntityKind::Issue => "issue",
            EntityKind::IssueComments => "issue-comments",
        }
    }
}

/// Deterministic cache/log key for an entity or a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn entity(kind: EntityKind, org: &str, project: &str, number: u64) -> Self {
        Self(format!("{}-{org}-{project}-{number}", kind.prefix()))
    }

    /// Key for one listing page; `target` is `org`, `org-project` or
    /// `org-project-number`.
    pub fn listing(kind: &str, target: &str, req: &ListRequest) -> Self {
        Self(format!(
            "list-{kind}-pages-{target}-{}-opts-{}",
            req.key_part(),
            req.query.signature()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exactly one cached remote payload. Freshness is derived from the
/// payload itself, so nothing else is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CacheEntry {
    PullRequest(RemotePullRequest),
    CommitFiles(Vec<CommitFile>),
    PullRequestComments(Vec<PullRequestComment>),
    Reviews(Vec<Review>),
    Issue(RemoteIssue),
    IssueComments(Vec<IssueComment>),
}

impl CacheEntry {
    pub fn kind(&self) -> EntityKind {
        match self {
            CacheEntry::PullRequest(_) => EntityKind::PullRequest,
            CacheEntry::CommitFiles(_) => EntityKind::PullRequestFiles,
            CacheEntry::PullRequestComments(_) => EntityKind::PullRequestComments,
            CacheEntry::Reviews(_) => EntityKind::Reviews,
            CacheEntry::Issue(_) => EntityKind::Issue,
            CacheEntry::IssueComments(_) => EntityKind::IssueComments,
        }
    }
}

/// A payload type that has its own cache entry variant.
pub trait Cacheable: Sized {
    const KIND: EntityKind;

    fn into_entry(self) -> CacheEntry;

    fn from_entry(entry: CacheEntry) -> Option<Self>;
}

macro_rules! cacheable {
    ($ty:ty, $variant:ident, $kind:ident) => {
        impl Cacheable for $ty {
            const KIND: EntityKind = EntityKind::$kind;

            fn into_entry(self) -> CacheEntry {
                CacheEntry::$variant(self)
            }

            fn from_entry(entry: CacheEntry) -> Option<Self> {
                match entry {
                    CacheEntry::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

cacheable!(RemotePullRequest, PullRequest, PullRequest);
cacheable!(Vec<CommitFile>, CommitFiles, PullRequestFiles);
cacheable!(Vec<PullRequestComment>, PullRequestComments, PullRequestComments);
cacheable!(Vec<Review>, Reviews, Reviews);
cacheable!(RemoteIssue, Issue, Issue);
cacheable!(Vec<IssueComment>, IssueComments, IssueComments);
