use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::RetryPolicy;
use crate::domain::models::LlmError;
use crate::domain::models::RefineError;

fn policy(attempts: u32) -> RetryPolicy {
    return RetryPolicy {
        attempts,
        base_delay: Duration::from_millis(1),
    };
}

#[test]
fn it_backs_off_exponentially() {
    let policy = RetryPolicy {
        attempts: 5,
        base_delay: Duration::from_millis(100),
    };

    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for(4), Duration::from_millis(800));
}

#[tokio::test]
async fn it_retries_retryable_errors_until_success() {
    let calls = AtomicU32::new(0);

    let res = policy(3)
        .run("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            return async move {
                if n < 2 {
                    return Err(LlmError::RateLimited("429".to_string()));
                }
                return Ok("done".to_string());
            };
        })
        .await;

    assert_eq!(res, Ok("done".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn it_gives_up_after_the_budget() {
    let calls = AtomicU32::new(0);

    let res: Result<String, LlmError> = policy(2)
        .run("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            return async { return Err(LlmError::Network("refused".to_string())) };
        })
        .await;

    assert_eq!(res, Err(LlmError::Network("refused".to_string())));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn it_does_not_retry_auth_or_parse_errors() {
    let calls = AtomicU32::new(0);
    let res: Result<String, LlmError> = policy(5)
        .run("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            return async { return Err(LlmError::Auth("bad key".to_string())) };
        })
        .await;
    assert!(res.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let calls = AtomicU32::new(0);
    let res: Result<String, RefineError> = policy(5)
        .run("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            return async { return Err(RefineError::RefinementParseError) };
        })
        .await;
    assert!(matches!(res, Err(RefineError::RefinementParseError)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn it_always_tries_at_least_once() {
    let calls = AtomicU32::new(0);
    let res: Result<u32, LlmError> = policy(0)
        .run("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            return async { return Ok(1) };
        })
        .await;

    assert_eq!(res, Ok(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
