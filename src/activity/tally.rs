use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::comments::CommentSummary;
use super::filter::{UserFilter, is_bot_login};
use super::issues::IssueSummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyItem {
    pub name: String,
    pub count: u64,
}

/// Largest count first, ties by name.
fn ranked(counts: HashMap<String, u64>) -> Vec<TallyItem> {
    let mut items: Vec<TallyItem> = counts
        .into_iter()
        .map(|(name, count)| TallyItem { name, count })
        .collect();
    items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    items
}

fn counts_toward(login: &str, users: &UserFilter) -> bool {
    !login.is_empty() && !is_bot_login(login) && users.matches(login)
}

/// Issues closed per user.
pub fn issue_closer_tally(issues: &[IssueSummary], users: &UserFilter) -> Vec<TallyItem> {
    let mut counts = HashMap::new();
    for i in issues.iter().filter(|i| counts_toward(&i.closer, users)) {
        *counts.entry(i.closer.clone()).or_default() += 1;
    }
    ranked(counts)
}

/// Issues opened per user.
pub fn issue_opener_tally(issues: &[IssueSummary], users: &UserFilter) -> Vec<TallyItem> {
    let mut counts = HashMap::new();
    for i in issues.iter().filter(|i| counts_toward(&i.author, users)) {
        *counts.entry(i.author.clone()).or_default() += 1;
    }
    ranked(counts)
}

/// Words written on other people's issues and pull requests.
pub fn comment_words_tally(comments: &[CommentSummary], users: &UserFilter) -> Vec<TallyItem> {
    let mut counts = HashMap::new();
    for c in comments
        .iter()
        .filter(|c| c.commenter != c.issue_author && counts_toward(&c.commenter, users))
    {
        *counts.entry(c.commenter.clone()).or_default() += u64::from(c.words);
    }
    ranked(counts)
}

pub fn comments_tally(comments: &[CommentSummary], users: &UserFilter) -> Vec<TallyItem> {
    let mut counts = HashMap::new();
    for c in comments.iter().filter(|c| counts_toward(&c.commenter, users)) {
        *counts.entry(c.commenter.clone()).or_default() += u64::from(c.comments);
    }
    ranked(counts)
}
