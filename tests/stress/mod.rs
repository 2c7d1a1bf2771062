use opgate::{
    run_operation, with_resilience, BulkheadConfig, CircuitBreakerConfig, NoopHooks,
    OperationInfo, RateLimitConfig, ResilienceConfig,
};
use opgate_core::{ApiError, CallContext, Error};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn mixed_outcomes_across_scopes_leak_nothing() {
    let config = ResilienceConfig::default()
        .with_circuit_breaker(CircuitBreakerConfig::new(20, Duration::from_millis(20)))
        .with_bulkhead(BulkheadConfig::new(16, Some(Duration::from_millis(50))))
        .with_rate_limit(RateLimitConfig::new(1_000_000.0, 10_000));
    let hooks = with_resilience(Arc::new(NoopHooks), Some(config));
    let ctx = CallContext::background();
    let rejected = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    let mut tasks = Vec::new();
    for i in 0..10_000u32 {
        let hooks = Arc::clone(&hooks);
        let ctx = ctx.clone();
        let rejected = Arc::clone(&rejected);
        tasks.push(tokio::spawn(async move {
            let op = OperationInfo::new("Stress", format!("Op{}", i % 8));
            let result = run_operation(&*hooks, ctx, &op, |_ctx| async move {
                tokio::task::yield_now().await;
                if i % 7 == 0 {
                    Err(Error::Api(ApiError::api(503, "unavailable")))
                } else {
                    Ok(i)
                }
            })
            .await;
            if matches!(&result, Err(err) if err.is_gating()) {
                rejected.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    println!(
        "10000 operations in {:?}, {} rejected by gates",
        started.elapsed(),
        rejected.load(Ordering::Relaxed)
    );
    for i in 0..8 {
        assert_eq!(hooks.bulkhead_in_use(&format!("Stress.Op{i}")), Some(0));
    }
    assert_eq!(hooks.outstanding_releases(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn cancelled_operations_leak_nothing() {
    let config = ResilienceConfig::default()
        .with_bulkhead(BulkheadConfig::new(4, None))
        .with_rate_limit(None);
    let hooks = with_resilience(Arc::new(NoopHooks), Some(config));

    let mut tasks = Vec::new();
    for i in 0..2_000u64 {
        let hooks = Arc::clone(&hooks);
        tasks.push(tokio::spawn(async move {
            let ctx = CallContext::background().with_timeout(Duration::from_millis(i % 5));
            let op = OperationInfo::new("Stress", "Slow");
            let _ = run_operation(&*hooks, ctx, &op, |ctx| async move {
                tokio::select! {
                    reason = ctx.done() => Err(Error::Context(reason)),
                    _ = tokio::time::sleep(Duration::from_millis(1)) => Ok(()),
                }
            })
            .await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(hooks.bulkhead_in_use("Stress.Slow"), Some(0));
    assert_eq!(hooks.outstanding_releases(), 0);
}
