use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use pulltally::github::client::{parse_next_link, rate_limit_from_headers};
use pulltally::github::paging::{
    CursorPaginator, ListQuery, ListRequest, Listing, OffsetPaginator, PagePosition, Paginator,
    collect_pages,
};
use pulltally::github::retry::RetryPolicy;
use pulltally::github::{ApiError, ApiResponse, FetchError, ResponseMeta};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use tokio_util::sync::CancellationToken;

fn make_meta(next_page: u32, next_cursor: Option<&str>) -> ResponseMeta {
    ResponseMeta {
        next_page,
        next_cursor: next_cursor.map(str::to_string),
        ..ResponseMeta::default()
    }
}

fn make_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        max_jitter: Duration::ZERO,
    }
}

type Page = Result<ApiResponse<Vec<u32>>, ApiError>;

fn make_page(items: &[u32], meta: ResponseMeta) -> Page {
    Ok(ApiResponse {
        value: items.to_vec(),
        meta,
    })
}

#[test]
fn test_offset_starts_at_page_one() {
    assert_eq!(OffsetPaginator::start(100).position(), PagePosition::Page(1));
}

#[test]
fn test_offset_advances_to_next_page() {
    let next = OffsetPaginator::start(100)
        .advance(100, &make_meta(2, None))
        .unwrap();
    assert_eq!(next.position(), PagePosition::Page(2));
}

#[test]
fn test_offset_stops_without_next_page() {
    assert!(OffsetPaginator::start(100).advance(100, &make_meta(0, None)).is_none());
}

#[test]
fn test_offset_stops_on_empty_page() {
    assert!(OffsetPaginator::start(100).advance(0, &make_meta(2, None)).is_none());
}

#[test]
fn test_offset_stops_on_non_advancing_page() {
    let second = OffsetPaginator::start(100)
        .advance(100, &make_meta(2, None))
        .unwrap();
    assert!(second.advance(100, &make_meta(2, None)).is_none());
}

#[test]
fn test_cursor_starts_with_first_window() {
    assert_eq!(CursorPaginator::start(50).position(), PagePosition::First(50));
}

#[test]
fn test_cursor_continues_past_empty_page() {
    let next = CursorPaginator::start(50)
        .advance(0, &make_meta(0, Some("abc")))
        .unwrap();
    assert_eq!(next.position(), PagePosition::After("abc".into()));
}

#[test]
fn test_cursor_stops_without_cursor() {
    assert!(CursorPaginator::start(50).advance(50, &make_meta(3, None)).is_none());
    assert!(CursorPaginator::start(50).advance(50, &make_meta(0, Some(""))).is_none());
}

#[test]
fn test_cursor_stops_on_repeated_cursor() {
    let next = CursorPaginator::start(50)
        .advance(50, &make_meta(0, Some("abc")))
        .unwrap();
    assert!(next.advance(50, &make_meta(0, Some("abc"))).is_none());
}

#[test]
fn test_query_pairs_offset() {
    let req = ListRequest {
        query: ListQuery::new(100).state("closed").sort("updated", "desc"),
        position: PagePosition::Page(3),
    };
    let pairs = req.query_pairs();
    let get = |k: &str| pairs.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
    assert_eq!(get("state"), Some("closed"));
    assert_eq!(get("sort"), Some("updated"));
    assert_eq!(get("direction"), Some("desc"));
    assert_eq!(get("per_page"), Some("100"));
    assert_eq!(get("page"), Some("3"));
    assert_eq!(get("after"), None);
    assert_eq!(get("labels"), None);
}

#[test]
fn test_query_pairs_cursor_never_mixes_page() {
    let first = ListRequest {
        query: ListQuery::new(50),
        position: PagePosition::First(50),
    };
    let after = ListRequest {
        query: ListQuery::new(50),
        position: PagePosition::After("Y3Vy".into()),
    };

    assert!(first.query_pairs().iter().any(|(k, v)| k == "first" && v == "50"));
    assert!(!first.query_pairs().iter().any(|(k, _)| k == "page"));
    assert!(after.query_pairs().iter().any(|(k, v)| k == "after" && v == "Y3Vy"));
    assert!(!after.query_pairs().iter().any(|(k, _)| k == "page" || k == "first"));
}

#[test]
fn test_signature_covers_filters() {
    let mut a = ListQuery::new(50).state("closed");
    let b = a.clone();
    a.labels = vec!["bug".into()];
    assert_ne!(a.signature(), b.signature());
    assert!(a.signature().contains("labels=bug"));
}

#[test]
fn test_parse_next_link_page() {
    let link = r#"<https://api.github.com/repos/o/p/pulls?state=closed&page=2>; rel="next", <https://api.github.com/repos/o/p/pulls?state=closed&page=9>; rel="last""#;
    assert_eq!(parse_next_link(link), (2, None));
}

#[test]
fn test_parse_next_link_cursor() {
    let link = r#"<https://api.github.com/repos/o/p/issues?per_page=50&after=Y3Vyc29y>; rel="next""#;
    assert_eq!(parse_next_link(link), (0, Some("Y3Vyc29y".into())));
}

#[test]
fn test_parse_next_link_without_next() {
    let link = r#"<https://api.github.com/repos/o/p/pulls?page=1>; rel="prev""#;
    assert_eq!(parse_next_link(link), (0, None));
    assert_eq!(parse_next_link(""), (0, None));
}

#[test]
fn test_rate_limit_from_headers() {
    let mut headers = HeaderMap::new();
    headers.insert("x-ratelimit-remaining", HeaderValue::from_static("42"));
    headers.insert("x-ratelimit-limit", HeaderValue::from_static("5000"));
    headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));

    let rate = rate_limit_from_headers(&headers);
    assert_eq!(rate.remaining, 42);
    assert_eq!(rate.limit, 5000);
    assert_eq!(rate.reset_at.unwrap().timestamp(), 1_700_000_000);
}

#[tokio::test]
async fn test_collect_pages_preserves_order_across_pages() {
    let pages = Mutex::new(VecDeque::from(vec![
        make_page(&[5, 4], make_meta(2, None)),
        make_page(&[3, 2], make_meta(3, None)),
        make_page(&[1], make_meta(0, None)),
    ]));
    let seen = Mutex::new(Vec::new());

    let items = collect_pages::<OffsetPaginator, _, _, _>(
        &CancellationToken::new(),
        &make_policy(),
        Listing::repo("pr", "PullRequests.List", "org-a", "proj"),
        &ListQuery::new(2),
        |req| {
            seen.lock().unwrap().push(req.position.clone());
            let page = pages.lock().unwrap().pop_front().unwrap();
            async move { page }
        },
    )
    .await
    .unwrap();

    assert_eq!(items, vec![5, 4, 3, 2, 1]);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            PagePosition::Page(1),
            PagePosition::Page(2),
            PagePosition::Page(3)
        ]
    );
}

#[tokio::test]
async fn test_collect_pages_cursor_follows_tokens() {
    let pages = Mutex::new(VecDeque::from(vec![
        make_page(&[1, 2], make_meta(0, Some("c1"))),
        make_page(&[], make_meta(0, Some("c2"))),
        make_page(&[3], make_meta(0, None)),
    ]));
    let seen = Mutex::new(Vec::new());

    let items = collect_pages::<CursorPaginator, _, _, _>(
        &CancellationToken::new(),
        &make_policy(),
        Listing::repo("issue", "Issues.ListByRepo", "org-a", "proj"),
        &ListQuery::new(2),
        |req| {
            seen.lock().unwrap().push(req.position.clone());
            let page = pages.lock().unwrap().pop_front().unwrap();
            async move { page }
        },
    )
    .await
    .unwrap();

    assert_eq!(items, vec![1, 2, 3]);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            PagePosition::First(2),
            PagePosition::After("c1".into()),
            PagePosition::After("c2".into())
        ]
    );
}

#[tokio::test]
async fn test_collect_pages_discards_partial_results_on_failure() {
    let pages = Mutex::new(VecDeque::from(vec![
        make_page(&[1, 2], make_meta(2, None)),
        Err(ApiError::Status {
            status: StatusCode::NOT_FOUND,
            body: "gone".into(),
        }),
    ]));

    let result = collect_pages::<OffsetPaginator, _, _, _>(
        &CancellationToken::new(),
        &make_policy(),
        Listing::repo("pr", "PullRequests.List", "org-a", "proj"),
        &ListQuery::new(2),
        |_req| {
            let page = pages.lock().unwrap().pop_front().unwrap();
            async move { page }
        },
    )
    .await;

    match result {
        Err(FetchError::Fatal { call, .. }) => {
            assert!(call.contains("PullRequests.List page 2 for org-a/proj"));
        }
        other => panic!("expected fatal error, got {other:?}"),
    }
}
