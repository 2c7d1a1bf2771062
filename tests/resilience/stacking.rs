use super::support::{server_error, Recorder};
use opgate::{
    run_operation, with_bulkhead, with_circuit_breaker, BulkheadConfig, ChainHooks,
    CircuitBreakerConfig, CircuitState, GatingHooks, Hooks, NoopHooks, OperationInfo,
};
use opgate_core::{CallContext, Error};
use std::sync::Arc;
use std::time::Duration;

fn op() -> OperationInfo {
    OperationInfo::new("Todos", "Get")
}

#[tokio::test]
async fn nested_wrappers_all_gate() {
    let bulkhead = with_bulkhead(
        Arc::new(NoopHooks),
        Some(BulkheadConfig::new(1, Some(Duration::ZERO))),
    );
    let hooks = with_circuit_breaker(bulkhead.clone(), None);
    let ctx = CallContext::background();

    let admission = hooks.on_operation_gate(&ctx, &op()).await.unwrap();
    assert_eq!(bulkhead.bulkhead_in_use("Todos.Get"), Some(1));

    let err = hooks.on_operation_gate(&ctx, &op()).await.unwrap_err();
    assert!(err.is_bulkhead_full());

    let started = hooks.on_operation_start(ctx, &op(), &admission);
    hooks.on_operation_end(&started, &op(), &admission, None, Duration::ZERO);
    assert_eq!(bulkhead.bulkhead_in_use("Todos.Get"), Some(0));
    assert_eq!(bulkhead.outstanding_releases(), 0);
    assert_eq!(hooks.circuit_state("Todos.Get"), Some(CircuitState::Closed));
}

#[tokio::test(start_paused = true)]
async fn inner_rejection_gives_trial_back() {
    let bulkhead = with_bulkhead(
        Arc::new(NoopHooks),
        Some(BulkheadConfig::new(1, Some(Duration::ZERO))),
    );
    let hooks = with_circuit_breaker(
        bulkhead.clone(),
        Some(CircuitBreakerConfig::new(1, Duration::from_millis(50))),
    );
    let ctx = CallContext::background();

    let _ = run_operation(&*hooks, ctx.clone(), &op(), |_ctx| async {
        Err::<(), _>(server_error())
    })
    .await;
    assert_eq!(hooks.circuit_state("Todos.Get"), Some(CircuitState::Open));
    tokio::time::advance(Duration::from_millis(60)).await;

    // Occupy the only slot behind the breaker's back.
    let held = bulkhead.on_operation_gate(&ctx, &op()).await.unwrap();

    let err = hooks.on_operation_gate(&ctx, &op()).await.unwrap_err();
    assert!(err.is_bulkhead_full());
    assert_eq!(hooks.circuit_state("Todos.Get"), Some(CircuitState::HalfOpen));

    bulkhead.on_operation_end(&ctx, &op(), &held, None, Duration::ZERO);

    // The trial was returned, so the next call may probe.
    run_operation(&*hooks, ctx, &op(), |_ctx| async { Ok::<_, Error>(()) })
        .await
        .unwrap();
    assert_eq!(hooks.circuit_state("Todos.Get"), Some(CircuitState::Closed));
}

#[tokio::test]
async fn chain_forwards_to_its_gater() {
    let recorder = Recorder::new();
    let gate = with_bulkhead(recorder.clone(), Some(BulkheadConfig::new(1, None)));
    let logging = Recorder::new();
    let first: Arc<dyn Hooks> = gate.clone();
    let second: Arc<dyn Hooks> = logging.clone();
    let noop: Arc<dyn Hooks> = Arc::new(NoopHooks);
    let chain = ChainHooks::new(vec![first, second, noop]);

    assert!(chain.as_gating().is_some());
    run_operation(&*chain, CallContext::background(), &op(), |_ctx| async {
        Ok::<_, Error>(())
    })
    .await
    .unwrap();

    assert_eq!(recorder.calls(), vec!["start Todos.Get", "end Todos.Get ok"]);
    assert_eq!(logging.calls(), vec!["start Todos.Get", "end Todos.Get ok"]);
    assert_eq!(gate.bulkhead_in_use("Todos.Get"), Some(0));
    assert_eq!(gate.outstanding_releases(), 0);
}
