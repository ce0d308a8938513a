pub mod changes;

pub use changes::{
    PullRequestSummary, SummaryRules, classify, clean_description, parse_html_url,
    summarize_file_changes, summarize_pulls,
};
