use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::activity::filter::Window;
use crate::github::models::{CommitFile, RemotePullRequest};
use crate::util::config::{ExclusionPolicy, SummaryConfig};
use crate::util::time::format_date;

/// Path patterns and limits for summarizing pull requests, compiled once.
#[derive(Debug, Clone)]
pub struct SummaryRules {
    /// Files that are mostly generated; their additions are capped.
    pub generated: Regex,
    /// Vendored or generated paths, handled per `exclusion`.
    pub ignored: Regex,
    /// Markup stripped from descriptions.
    pub comment: Regex,
    pub addition_cap: u32,
    pub description_limit: usize,
    pub exclusion: ExclusionPolicy,
}

impl SummaryRules {
    pub fn from_config(cfg: &SummaryConfig) -> Result<Self> {
        Ok(Self {
            generated: Regex::new(&cfg.generated_pattern)
                .with_context(|| format!("Invalid generated_pattern: {}", cfg.generated_pattern))?,
            ignored: Regex::new(&cfg.ignored_pattern)
                .with_context(|| format!("Invalid ignored_pattern: {}", cfg.ignored_pattern))?,
            comment: Regex::new(&cfg.comment_pattern)
                .with_context(|| format!("Invalid comment_pattern: {}", cfg.comment_pattern))?,
            addition_cap: cfg.addition_cap,
            description_limit: cfg.description_limit,
            exclusion: cfg.exclusion,
        })
    }
}

/// One merged pull request, flattened for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub url: String,
    pub date: String,
    pub user: String,
    pub project: String,
    #[serde(rename = "type")]
    pub pr_type: String,
    pub title: String,
    pub delta: u64,
    pub added: u64,
    pub deleted: u64,
    pub files_total: u32,
    /// Newline delimited.
    pub files: String,
    pub description: String,
}

/// Split `https://github.com/org/project/...` into `(org, project)`.
pub fn parse_html_url(url: &str) -> (String, String) {
    let Ok(parsed) = Url::parse(url) else {
        return (String::new(), String::new());
    };
    let mut segments = parsed
        .path_segments()
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty());
    let org = segments.next().unwrap_or("").to_string();
    let project = segments.next().unwrap_or("").to_string();
    (org, project)
}

/// Strip comment markup and cut to the configured number of characters.
pub fn clean_description(body: &str, rules: &SummaryRules) -> String {
    let stripped = rules.comment.replace_all(body, "");
    let stripped = stripped.trim();
    if stripped.chars().count() <= rules.description_limit {
        return stripped.to_string();
    }
    let mut cut: String = stripped.chars().take(rules.description_limit).collect();
    cut.push_str("...");
    cut
}

fn category(path: &str) -> String {
    let lower = path.to_lowercase();
    let name = lower.rsplit('/').next().unwrap_or(&lower);
    let ext = name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");

    if lower.starts_with(".github/") || lower.starts_with(".circleci/") || name == ".gitlab-ci.yml" {
        return "ci".to_string();
    }
    if matches!(
        name,
        "makefile" | "dockerfile" | "cargo.toml" | "cargo.lock" | "go.mod" | "go.sum"
            | "package.json" | "build.gradle" | "cmakelists.txt"
    ) {
        return "build".to_string();
    }
    if lower.starts_with("docs/") || lower.contains("/docs/") || matches!(ext, "md" | "rst" | "txt" | "adoc") {
        return "docs".to_string();
    }
    if lower.starts_with("test/")
        || lower.starts_with("tests/")
        || lower.contains("/test/")
        || lower.contains("/tests/")
        || name.contains("_test.")
        || name.contains(".test.")
        || name.contains(".spec.")
    {
        return "tests".to_string();
    }
    if ext.is_empty() {
        "other".to_string()
    } else {
        ext.to_string()
    }
}

/// Categories of the given files, largest by changed lines first, joined with `+`.
pub fn classify<'a>(files: impl IntoIterator<Item = &'a CommitFile>) -> String {
    let mut sizes: HashMap<String, u64> = HashMap::new();
    for f in files {
        let changed = if f.changes > 0 {
            f.changes
        } else {
            f.additions + f.deletions
        };
        *sizes.entry(category(&f.filename)).or_default() += changed as u64;
    }

    let mut ordered: Vec<(String, u64)> = sizes.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ordered
        .into_iter()
        .map(|(c, _)| c)
        .collect::<Vec<_>>()
        .join("+")
}

/// Reduce one pull request and its file diffs to a report row.
pub fn summarize_file_changes(
    pr: &RemotePullRequest,
    files: &[CommitFile],
    rules: &SummaryRules,
) -> PullRequestSummary {
    let (_, project) = parse_html_url(&pr.html_url);
    let date = pr.merged_at.or(pr.closed_at).unwrap_or(pr.updated_at);

    let mut added: u64 = 0;
    let mut deleted: u64 = 0;
    let mut paths = Vec::with_capacity(files.len());
    let mut typed = Vec::with_capacity(files.len());

    for f in files {
        paths.push(f.filename.as_str());
        let ignored = rules.ignored.is_match(&f.filename);
        if !(ignored && rules.exclusion != ExclusionPolicy::CountAll) {
            typed.push(f);
        }
        if ignored && rules.exclusion == ExclusionPolicy::ExcludeFromSizeAndType {
            debug!(file = %f.filename, "Ignoring path for size");
            continue;
        }

        if rules.generated.is_match(&f.filename) && f.additions > rules.addition_cap {
            debug!(
                file = %f.filename,
                from = f.additions,
                to = rules.addition_cap,
                "Truncating lines added"
            );
            added += rules.addition_cap as u64;
        } else {
            added += f.additions as u64;
        }
        deleted += f.deletions as u64;
    }

    debug!(
        url = %pr.html_url,
        files = files.len(),
        added,
        deleted,
        "Summarized file changes"
    );

    PullRequestSummary {
        url: pr.html_url.clone(),
        date: format_date(&date),
        user: pr.author().to_string(),
        project,
        pr_type: classify(typed),
        title: pr.title.clone(),
        delta: added + deleted,
        added,
        deleted,
        files_total: if pr.changed_files > 0 {
            pr.changed_files
        } else {
            files.len() as u32
        },
        files: paths.join("\n"),
        description: clean_description(pr.body.as_deref().unwrap_or(""), rules),
    }
}

/// Summarize a batch, keeping the first row per URL and re-checking the
/// merge (else close) time against `window`.
pub fn summarize_pulls(
    batch: &[(RemotePullRequest, Vec<CommitFile>)],
    window: &Window,
    rules: &SummaryRules,
) -> Vec<PullRequestSummary> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for (pr, files) in batch {
        if !seen.insert(pr.html_url.as_str()) {
            info!(url = %pr.html_url, "skipping seen pull request");
            continue;
        }
        let Some(t) = pr.merged_at.or(pr.closed_at) else {
            info!(url = %pr.html_url, "skipping pull request with no merge or close time");
            continue;
        };
        if !window.contains(t) {
            info!(url = %pr.html_url, closed = %t, "skipping pull request outside window");
            continue;
        }
        out.push(summarize_file_changes(pr, files, rules));
    }

    out
}
