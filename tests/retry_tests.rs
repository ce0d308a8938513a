use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use pulltally::github::retry::{RetryPolicy, retry_call};
use pulltally::github::{ApiError, FetchError};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

fn make_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(30),
        max_jitter: Duration::ZERO,
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: StatusCode::BAD_GATEWAY,
        body: "upstream".into(),
    }
}

#[test]
fn test_backoff_is_exponential_and_capped() {
    let policy = RetryPolicy {
        max_attempts: 10,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(1000),
        max_jitter: Duration::ZERO,
    };
    assert_eq!(policy.backoff(0, None), Duration::from_millis(100));
    assert_eq!(policy.backoff(1, None), Duration::from_millis(200));
    assert_eq!(policy.backoff(3, None), Duration::from_millis(800));
    assert_eq!(policy.backoff(4, None), Duration::from_millis(1000));
    assert_eq!(policy.backoff(40, None), Duration::from_millis(1000));
}

#[test]
fn test_backoff_honors_longer_retry_after() {
    let policy = make_policy(5);
    assert_eq!(
        policy.backoff(0, Some(Duration::from_secs(7))),
        Duration::from_secs(7)
    );
    assert_eq!(
        policy.backoff(0, Some(Duration::from_millis(1))),
        Duration::from_millis(100)
    );
}

#[test]
fn test_backoff_jitter_is_bounded() {
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(100),
        max_jitter: Duration::from_millis(50),
    };
    for _ in 0..100 {
        let d = policy.backoff(2, None);
        assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(150));
    }
}

#[test]
fn test_retryable_classification() {
    assert!(server_error().is_retryable());
    assert!(
        ApiError::RateLimited {
            status: StatusCode::TOO_MANY_REQUESTS,
            retry_after: None
        }
        .is_retryable()
    );
    assert!(
        !ApiError::Status {
            status: StatusCode::NOT_FOUND,
            body: String::new()
        }
        .is_retryable()
    );
    let decode = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
    assert!(!ApiError::Decode(decode).is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_after_transient_failures() {
    let calls = AtomicU32::new(0);

    let result = retry_call(
        &CancellationToken::new(),
        &make_policy(5),
        "pr-org-a-proj-1",
        "PullRequests.Get org-a/proj#1",
        || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err(server_error()) } else { Ok(n) } }
        },
    )
    .await;

    assert_eq!(result.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_names_call_and_attempts() {
    let calls = AtomicU32::new(0);

    let result: Result<(), FetchError> = retry_call(
        &CancellationToken::new(),
        &make_policy(3),
        "pr-org-a-proj-1",
        "PullRequests.Get org-a/proj#1",
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(server_error()) }
        },
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
    let message = err.to_string();
    assert!(message.contains("PullRequests.Get org-a/proj#1"));
    assert!(message.contains("after 3 attempts"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_decode_error_is_not_retried() {
    let calls = AtomicU32::new(0);

    let result: Result<u32, FetchError> = retry_call(
        &CancellationToken::new(),
        &make_policy(5),
        "issue-org-a-proj-2",
        "Issues.Get org-a/proj#2",
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Decode(serde_json::from_str::<u32>("[]").unwrap_err())) }
        },
    )
    .await;

    assert!(matches!(result, Err(FetchError::Fatal { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_first_attempt() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let calls = AtomicU32::new(0);

    let result: Result<u32, FetchError> = retry_call(&cancel, &make_policy(5), "k", "call", || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok(1) }
    })
    .await;

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_backoff() {
    let cancel = CancellationToken::new();
    let policy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_secs(3600),
        max_delay: Duration::from_secs(3600),
        max_jitter: Duration::ZERO,
    };

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let result: Result<u32, FetchError> =
        retry_call(&cancel, &policy, "k", "call", || async { Err(server_error()) }).await;

    assert!(result.unwrap_err().is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(3600));
}
