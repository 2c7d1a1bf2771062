use opgate::{
    run_operation, with_resilience, Admission, BulkheadConfig, GatingHooks, Hooks, NoopHooks,
    OperationInfo, ResilienceConfig,
};
use opgate_core::{CallContext, Error};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Starts every operation on a fresh context with its own deadline.
struct FreshContext {
    saw_deadline_at_end: AtomicBool,
}

impl Hooks for FreshContext {
    fn on_operation_start(
        &self,
        _ctx: CallContext,
        _op: &OperationInfo,
        _admission: &Admission,
    ) -> CallContext {
        CallContext::background().with_timeout(Duration::from_secs(30))
    }

    fn on_operation_end(
        &self,
        ctx: &CallContext,
        _op: &OperationInfo,
        _admission: &Admission,
        _error: Option<&Error>,
        _duration: Duration,
    ) {
        self.saw_deadline_at_end
            .store(ctx.deadline().is_some(), Ordering::SeqCst);
    }
}

#[tokio::test]
async fn replaced_context_still_releases_slot() {
    let observer = Arc::new(FreshContext {
        saw_deadline_at_end: AtomicBool::new(false),
    });
    let config = ResilienceConfig::default().with_bulkhead(BulkheadConfig::new(1, None));
    let hooks = with_resilience(observer.clone(), Some(config));
    let op = OperationInfo::new("Todos", "Get");

    let deadline = run_operation(&*hooks, CallContext::background(), &op, |ctx| async move {
        Ok::<_, Error>(ctx.deadline())
    })
    .await
    .unwrap();

    assert!(deadline.is_some());
    assert!(observer.saw_deadline_at_end.load(Ordering::SeqCst));
    assert_eq!(hooks.bulkhead_in_use("Todos.Get"), Some(0));
    assert_eq!(hooks.outstanding_releases(), 0);
}

#[tokio::test]
async fn admission_survives_a_new_context_by_hand() {
    let hooks = with_resilience(Arc::new(NoopHooks), None);
    let op = OperationInfo::new("Campfires", "Post").mutation();

    let gated = CallContext::background();
    let admission = hooks.on_operation_gate(&gated, &op).await.unwrap();
    assert!(admission.is_tracked());
    assert_eq!(hooks.bulkhead_in_use("Campfires.Post"), Some(1));

    // End is reported on a context unrelated to the one that was gated.
    let unrelated = CallContext::background().with_timeout(Duration::from_secs(1));
    let started = hooks.on_operation_start(unrelated, &op, &admission);
    hooks.on_operation_end(&started, &op, &admission, None, Duration::ZERO);

    assert_eq!(hooks.bulkhead_in_use("Campfires.Post"), Some(0));
}

#[tokio::test]
async fn expired_deadline_is_rejected_before_waiting() {
    let config = ResilienceConfig::disabled().with_bulkhead(BulkheadConfig::new(1, None));
    let hooks = with_resilience(Arc::new(NoopHooks), Some(config));
    let op = OperationInfo::new("Todos", "Get");

    let held = hooks
        .on_operation_gate(&CallContext::background(), &op)
        .await
        .unwrap();

    let ctx = CallContext::background().with_timeout(Duration::from_millis(20));
    let err = run_operation(&*hooks, ctx, &op, |_ctx| async { Ok::<_, Error>(()) })
        .await
        .unwrap_err();
    assert_eq!(
        err.context_error(),
        Some(opgate_core::ContextError::DeadlineExceeded)
    );
    assert!(!err.is_gating());

    hooks.on_operation_end(&CallContext::background(), &op, &held, None, Duration::ZERO);
    assert_eq!(hooks.outstanding_releases(), 0);
}
