use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use pulltally::activity::Window;
use pulltally::github::models::{BranchRef, CommitFile, RemotePullRequest, RemoteUser};
use pulltally::summary::{
    SummaryRules, classify, clean_description, parse_html_url, summarize_file_changes,
    summarize_pulls,
};
use pulltally::util::config::{ExclusionPolicy, SummaryConfig};
use regex::Regex;

fn make_rules() -> SummaryRules {
    SummaryRules::from_config(&SummaryConfig::default()).unwrap()
}

fn make_rules_with(exclusion: ExclusionPolicy) -> SummaryRules {
    SummaryRules {
        exclusion,
        ..make_rules()
    }
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, day, 12, 0, 0).unwrap()
}

fn make_pr(number: u64, merged_day: u32) -> RemotePullRequest {
    RemotePullRequest {
        number,
        title: format!("Change {number}"),
        body: Some("Fixes the thing.".into()),
        state: "closed".into(),
        html_url: format!("https://github.com/org-a/proj/pull/{number}"),
        user: Some(RemoteUser {
            login: "alice".into(),
            kind: Some("User".into()),
        }),
        merged_by: None,
        base: Some(BranchRef {
            name: "main".into(),
            sha: None,
        }),
        merged: true,
        merge_commit_sha: Some("abc123".into()),
        changed_files: 2,
        created_at: at(1),
        updated_at: at(merged_day),
        closed_at: Some(at(merged_day)),
        merged_at: Some(at(merged_day)),
    }
}

fn make_file(filename: &str, additions: u32, deletions: u32) -> CommitFile {
    CommitFile {
        filename: filename.into(),
        status: "modified".into(),
        additions,
        deletions,
        changes: additions + deletions,
    }
}

fn make_window() -> Window {
    Window::from_dates(
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2021, 1, 15).unwrap(),
    )
    .unwrap()
}

#[test]
fn test_generated_file_additions_are_capped() {
    let pr = make_pr(1, 5);
    let summary = summarize_file_changes(&pr, &[make_file("CHANGELOG.md", 37, 4)], &make_rules());
    assert_eq!(summary.added, 10);
    assert_eq!(summary.deleted, 4);
    assert_eq!(summary.delta, 14);
}

#[test]
fn test_regular_file_additions_are_not_capped() {
    let pr = make_pr(1, 5);
    let summary = summarize_file_changes(&pr, &[make_file("src/main.go", 37, 0)], &make_rules());
    assert_eq!(summary.added, 37);
}

#[test]
fn test_generated_file_deletions_are_never_capped() {
    let pr = make_pr(1, 5);
    let summary = summarize_file_changes(&pr, &[make_file("changelog", 2, 500)], &make_rules());
    assert_eq!(summary.added, 2);
    assert_eq!(summary.deleted, 500);
}

#[test]
fn test_summary_fields() {
    let mut pr = make_pr(12, 5);
    pr.changed_files = 7;
    let files = [make_file("src/a.rs", 3, 1), make_file("README.md", 1, 0)];

    let summary = summarize_file_changes(&pr, &files, &make_rules());
    assert_eq!(summary.url, "https://github.com/org-a/proj/pull/12");
    assert_eq!(summary.date, "2021-01-05");
    assert_eq!(summary.user, "alice");
    assert_eq!(summary.project, "proj");
    assert_eq!(summary.title, "Change 12");
    assert_eq!(summary.files_total, 7);
    assert_eq!(summary.files, "src/a.rs\nREADME.md");
    assert_eq!(summary.pr_type, "rs+docs");
    assert_eq!(summary.description, "Fixes the thing.");
}

#[test]
fn test_files_total_falls_back_to_file_count() {
    let mut pr = make_pr(1, 5);
    pr.changed_files = 0;
    let files = [make_file("a.rs", 1, 0), make_file("b.rs", 1, 0), make_file("c.rs", 1, 0)];
    assert_eq!(summarize_file_changes(&pr, &files, &make_rules()).files_total, 3);
}

#[test]
fn test_exclusion_count_all() {
    let files = [make_file("vendor/lib/x.go", 90, 10), make_file("src/a.rs", 8, 2)];
    let summary =
        summarize_file_changes(&make_pr(1, 5), &files, &make_rules_with(ExclusionPolicy::CountAll));
    assert_eq!(summary.added, 98);
    assert_eq!(summary.pr_type, "go+rs");
}

#[test]
fn test_exclusion_from_type_only() {
    let files = [make_file("vendor/lib/x.go", 90, 10), make_file("src/a.rs", 8, 2)];
    let summary = summarize_file_changes(
        &make_pr(1, 5),
        &files,
        &make_rules_with(ExclusionPolicy::ExcludeFromType),
    );
    assert_eq!(summary.added, 98);
    assert_eq!(summary.deleted, 12);
    assert_eq!(summary.pr_type, "rs");
    assert!(summary.files.contains("vendor/lib/x.go"));
}

#[test]
fn test_exclusion_from_size_and_type() {
    let files = [make_file("vendor/lib/x.go", 90, 10), make_file("src/a.rs", 8, 2)];
    let summary = summarize_file_changes(
        &make_pr(1, 5),
        &files,
        &make_rules_with(ExclusionPolicy::ExcludeFromSizeAndType),
    );
    assert_eq!(summary.added, 8);
    assert_eq!(summary.deleted, 2);
    assert_eq!(summary.pr_type, "rs");
}

#[test]
fn test_injected_patterns() {
    let rules = SummaryRules {
        generated: Regex::new(r"\.lock$").unwrap(),
        ..make_rules()
    };
    let files = [make_file("Cargo.lock", 300, 0), make_file("CHANGELOG.md", 37, 0)];
    let summary = summarize_file_changes(&make_pr(1, 5), &files, &rules);
    assert_eq!(summary.added, 10 + 37);
}

#[test]
fn test_classify_orders_by_size() {
    let files = [
        make_file("docs/guide.md", 5, 0),
        make_file("pkg/foo_test.go", 15, 5),
        make_file("pkg/foo.go", 30, 0),
    ];
    assert_eq!(classify(&files), "go+tests+docs");
}

#[test]
fn test_classify_categories() {
    assert_eq!(classify(&[make_file(".github/workflows/ci.yml", 1, 0)]), "ci");
    assert_eq!(classify(&[make_file("Makefile", 1, 0)]), "build");
    assert_eq!(classify(&[make_file("tests/parse.rs", 1, 0)]), "tests");
    assert_eq!(classify(&[make_file("LICENSE", 1, 0)]), "other");
    assert_eq!(classify(Vec::<CommitFile>::new().iter()), "");
}

#[test]
fn test_description_strips_comments() {
    let body = "<!-- Please describe your change -->\nAdds caching.<!-- hidden\nmultiline -->";
    assert_eq!(clean_description(body, &make_rules()), "Adds caching.");
}

#[test]
fn test_description_is_truncated_by_characters() {
    let body = "é".repeat(300);
    let cleaned = clean_description(&body, &make_rules());
    assert!(cleaned.ends_with("..."));
    assert_eq!(cleaned.chars().count(), 243);

    let short = "x".repeat(240);
    assert_eq!(clean_description(&short, &make_rules()), short);
}

#[test]
fn test_parse_html_url() {
    assert_eq!(
        parse_html_url("https://github.com/org-a/proj/pull/3"),
        ("org-a".to_string(), "proj".to_string())
    );
    assert_eq!(parse_html_url("not a url"), (String::new(), String::new()));
}

#[test]
fn test_summarize_pulls_dedupes_by_url() {
    let pr = make_pr(1, 5);
    let batch = vec![
        (pr.clone(), vec![make_file("a.rs", 1, 0)]),
        (pr, vec![make_file("b.rs", 50, 0)]),
    ];

    let summaries = summarize_pulls(&batch, &make_window(), &make_rules());
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].files, "a.rs");
}

#[test]
fn test_summarize_pulls_rechecks_window() {
    let mut unmerged = make_pr(3, 10);
    unmerged.merged_at = None;
    let batch = vec![
        (make_pr(1, 5), vec![make_file("a.rs", 1, 0)]),
        (make_pr(2, 20), vec![make_file("b.rs", 1, 0)]),
        (unmerged, vec![make_file("c.rs", 1, 0)]),
    ];

    let summaries = summarize_pulls(&batch, &make_window(), &make_rules());
    let urls: Vec<&str> = summaries.iter().map(|s| s.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://github.com/org-a/proj/pull/1",
            "https://github.com/org-a/proj/pull/3"
        ]
    );
}

#[test]
fn test_invalid_pattern_is_rejected() {
    let cfg = SummaryConfig {
        ignored_pattern: "(unclosed".into(),
        ..SummaryConfig::default()
    };
    assert!(SummaryRules::from_config(&cfg).is_err());
}

#[test]
fn test_summary_serializes_type_field() {
    let summary = summarize_file_changes(&make_pr(1, 5), &[make_file("a.rs", 1, 0)], &make_rules());
    let value = serde_json::to_value(&summary).unwrap();
    assert_eq!(value["type"], "rs");
    assert_eq!(value["files_total"], 2);
}
