use std::collections::HashSet;

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};

use crate::github::models::RemoteUser;
use crate::util::time::{end_of_day, start_of_day};

/// Inclusive `[since, until]` reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl Window {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self> {
        if until < since {
            bail!("Window ends ({until}) before it starts ({since})");
        }
        Ok(Self { since, until })
    }

    /// From the start of `since` to the last second of `until`.
    pub fn from_dates(since: NaiveDate, until: NaiveDate) -> Result<Self> {
        Self::new(start_of_day(since), end_of_day(until))
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.since && t <= self.until
    }

    /// True when `t` is strictly before the window; in a listing sorted by
    /// update time descending, nothing after such an item can match.
    pub fn is_before(&self, t: DateTime<Utc>) -> bool {
        t < self.since
    }
}

/// Case-insensitive set of names. Empty matches everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    names: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.is_empty() || self.names.contains(&name.to_lowercase())
    }

    /// Any of the given names matches. Missing names never match a
    /// non-empty list.
    pub fn matches_any<'a>(&self, names: impl IntoIterator<Item = Option<&'a str>>) -> bool {
        if self.is_empty() {
            return true;
        }
        names
            .into_iter()
            .flatten()
            .filter(|n| !n.is_empty())
            .any(|n| self.names.contains(&n.to_lowercase()))
    }
}

/// Logins whose activity counts.
pub type UserFilter = AllowList;

/// Base branches a merged pull request may target.
pub type BranchFilter = AllowList;

/// GitHub marks app accounts with type `Bot`; many older automation
/// accounts only carry the suffix.
pub fn is_bot(user: Option<&RemoteUser>) -> bool {
    match user {
        Some(u) => u.kind.as_deref() == Some("Bot") || is_bot_login(&u.login),
        None => false,
    }
}

pub fn is_bot_login(login: &str) -> bool {
    login.to_lowercase().ends_with("bot")
}

/// Include/exclude glob patterns over repository names. A pattern matches
/// either the bare name or `org/name`.
#[derive(Debug, Clone, Default)]
pub struct RepoFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl RepoFilter {
    pub fn matches(&self, org: &str, name: &str) -> bool {
        let full_name = format!("{org}/{name}");

        if !self.include.is_empty()
            && !self
                .include
                .iter()
                .any(|p| glob_match(p, &full_name) || glob_match(p, name))
        {
            return false;
        }

        !self
            .exclude
            .iter()
            .any(|p| glob_match(p, &full_name) || glob_match(p, name))
    }
}

/// `*` matches any run of characters; everything else is literal.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let last = parts.len() - 1;
    let mut pos = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == last {
            return text[pos..].ends_with(part);
        }
        match text[pos..].find(part) {
            Some(idx) => {
                if i == 0 && idx != 0 {
                    return false;
                }
                pos += idx + part.len();
            }
            None => return false,
        }
    }

    true
}
