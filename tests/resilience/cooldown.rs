use opgate::{
    run_operation, with_rate_limit, with_resilience, BulkheadConfig, GatingHooks, Hooks,
    NoopHooks, OperationInfo, RateLimitConfig, RequestInfo, RequestResult, ResilienceConfig,
    DEFAULT_RATE_LIMIT_COOLDOWN,
};
use opgate_core::{CallContext, Error};
use std::sync::Arc;
use std::time::Duration;

fn list() -> OperationInfo {
    OperationInfo::new("Todos", "List")
}

fn request() -> RequestInfo {
    RequestInfo::new("GET", "https://3.basecampapi.com/999/buckets/1/todolists/2/todos.json", 1)
}

#[tokio::test(start_paused = true)]
async fn too_many_requests_blocks_every_scope() {
    let hooks = with_resilience(Arc::new(NoopHooks), None);
    let ctx = CallContext::background();

    hooks.on_request_end(&ctx, &request(), &RequestResult::status(429, Duration::ZERO));
    assert_eq!(hooks.rate_limiter_cooldown(), Some(DEFAULT_RATE_LIMIT_COOLDOWN));

    let err = hooks.on_operation_gate(&ctx, &list()).await.unwrap_err();
    assert!(err.is_rate_limited());
    let other = OperationInfo::new("People", "Get");
    let err = hooks.on_operation_gate(&ctx, &other).await.unwrap_err();
    assert!(err.is_rate_limited());

    tokio::time::advance(DEFAULT_RATE_LIMIT_COOLDOWN).await;
    run_operation(&*hooks, ctx, &list(), |_ctx| async { Ok::<_, Error>(()) })
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn retry_after_header_sets_cooldown() {
    let hooks = with_rate_limit(Arc::new(NoopHooks), None);
    let ctx = CallContext::background();

    let result = RequestResult::status(429, Duration::from_millis(40)).with_retry_after(3);
    hooks.on_request_end(&ctx, &request(), &result);
    assert_eq!(hooks.rate_limiter_cooldown(), Some(Duration::from_secs(3)));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(hooks.on_operation_gate(&ctx, &list()).await.is_err());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(hooks.on_operation_gate(&ctx, &list()).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn latest_retry_after_wins() {
    let hooks = with_rate_limit(Arc::new(NoopHooks), None);
    let ctx = CallContext::background();

    hooks.on_request_end(
        &ctx,
        &request(),
        &RequestResult::status(429, Duration::ZERO).with_retry_after(30),
    );
    hooks.on_request_end(
        &ctx,
        &request(),
        &RequestResult::status(503, Duration::ZERO).with_retry_after(1),
    );
    assert_eq!(hooks.rate_limiter_cooldown(), Some(Duration::from_secs(1)));
}

#[tokio::test(start_paused = true)]
async fn outage_without_retry_after_is_not_backpressure() {
    let hooks = with_rate_limit(Arc::new(NoopHooks), None);
    let ctx = CallContext::background();

    for status in [500, 502, 503, 504] {
        hooks.on_request_end(&ctx, &request(), &RequestResult::status(status, Duration::ZERO));
    }
    assert_eq!(hooks.rate_limiter_cooldown(), Some(Duration::ZERO));
    assert!(hooks.on_operation_gate(&ctx, &list()).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn exhausted_bucket_releases_bulkhead_slot() {
    let config = ResilienceConfig::default()
        .with_bulkhead(BulkheadConfig::new(2, Some(Duration::ZERO)))
        .with_rate_limit(RateLimitConfig::new(0.001, 1));
    let hooks = with_resilience(Arc::new(NoopHooks), Some(config));
    let ctx = CallContext::background();

    let admitted = hooks.on_operation_gate(&ctx, &list()).await.unwrap();
    assert_eq!(hooks.bulkhead_in_use("Todos.List"), Some(1));

    let err = hooks.on_operation_gate(&ctx, &list()).await.unwrap_err();
    assert!(err.is_rate_limited());
    assert_eq!(hooks.bulkhead_in_use("Todos.List"), Some(1));
    assert_eq!(hooks.outstanding_releases(), 1);

    hooks.on_operation_end(&ctx, &list(), &admitted, None, Duration::ZERO);
    assert_eq!(hooks.bulkhead_in_use("Todos.List"), Some(0));
    assert_eq!(hooks.outstanding_releases(), 0);
}

#[tokio::test]
async fn cached_responses_do_not_cool_down() {
    let hooks = with_rate_limit(Arc::new(NoopHooks), None);
    let ctx = CallContext::background();

    hooks.on_request_end(
        &ctx,
        &request(),
        &RequestResult::status(304, Duration::ZERO).cached(),
    );
    assert_eq!(hooks.rate_limiter_cooldown(), Some(Duration::ZERO));
}

#[tokio::test(start_paused = true)]
async fn absurd_retry_after_blocks_without_panicking() {
    let hooks = with_rate_limit(Arc::new(NoopHooks), None);
    let ctx = CallContext::background();

    let result = RequestResult::status(429, Duration::ZERO).with_retry_after(u64::MAX);
    hooks.on_request_end(&ctx, &request(), &result);
    let result = RequestResult::status(503, Duration::ZERO).with_retry_after(u64::MAX);
    hooks.on_request_end(&ctx, &request(), &result);

    let remaining = hooks.rate_limiter_cooldown().unwrap();
    assert!(remaining >= Duration::from_secs(86400 * 365));
    let err = hooks.on_operation_gate(&ctx, &list()).await.unwrap_err();
    assert!(err.is_rate_limited());
}

#[tokio::test(start_paused = true)]
async fn retry_after_can_be_ignored() {
    let config = RateLimitConfig::default().with_respect_retry_after(false);
    let hooks = with_rate_limit(Arc::new(NoopHooks), Some(config));
    let ctx = CallContext::background();

    hooks.on_request_end(&ctx, &request(), &RequestResult::status(429, Duration::ZERO));
    let result = RequestResult::status(503, Duration::ZERO).with_retry_after(120);
    hooks.on_request_end(&ctx, &request(), &result);

    assert_eq!(hooks.rate_limiter_cooldown(), Some(Duration::ZERO));
    run_operation(&*hooks, ctx, &list(), |_ctx| async { Ok::<_, Error>(()) })
        .await
        .unwrap();
}
