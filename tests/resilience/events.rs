use super::support::server_error;
use opgate::{
    run_operation, BulkheadConfig, BulkheadEvent, CircuitBreakerConfig, CircuitBreakerEvent,
    CircuitState, GatingHooks, Hooks, OperationInfo, RateLimiterEvent, RequestInfo,
    RequestResult, ResilienceHooks,
};
use opgate_core::{CallContext, Error, ResilienceEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Log = Arc<Mutex<Vec<String>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

#[tokio::test]
async fn breaker_transitions_are_reported() {
    let transitions = log();
    let sink = Arc::clone(&transitions);
    let hooks = ResilienceHooks::builder()
        .circuit_breaker(CircuitBreakerConfig::new(1, Duration::from_secs(60)))
        .on_circuit_breaker_event(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                scope,
                from_state,
                to_state,
                ..
            } = event
            {
                sink.lock()
                    .unwrap()
                    .push(format!("{scope}: {from_state} -> {to_state}"));
            }
        })
        .build();
    let op = OperationInfo::new("Schedules", "Get");

    let _ = run_operation(&hooks, CallContext::background(), &op, |_ctx| async {
        Err::<(), _>(server_error())
    })
    .await;

    assert_eq!(hooks.circuit_state("Schedules.Get"), Some(CircuitState::Open));
    assert_eq!(
        *transitions.lock().unwrap(),
        vec!["Schedules.Get: closed -> open"]
    );
}

#[tokio::test]
async fn bulkhead_reports_each_slot() {
    let kinds = log();
    let sink = Arc::clone(&kinds);
    let hooks = ResilienceHooks::builder()
        .bulkhead(BulkheadConfig::new(1, Some(Duration::ZERO)))
        .on_bulkhead_event(move |event: &BulkheadEvent| {
            sink.lock().unwrap().push(event.event_type().to_string());
        })
        .build();
    let ctx = CallContext::background();
    let op = OperationInfo::new("Vaults", "List");

    let admission = hooks.on_operation_gate(&ctx, &op).await.unwrap();
    assert!(hooks.on_operation_gate(&ctx, &op).await.is_err());
    hooks.on_operation_end(&ctx, &op, &admission, None, Duration::ZERO);

    assert_eq!(
        *kinds.lock().unwrap(),
        vec!["call_permitted", "call_rejected", "slot_released"]
    );
}

#[tokio::test]
async fn cooldown_and_rejection_are_reported() {
    let events = log();
    let sink = Arc::clone(&events);
    let hooks = ResilienceHooks::builder()
        .circuit_breaker(None)
        .bulkhead(None)
        .on_rate_limiter_event(move |event: &RateLimiterEvent| {
            let entry = match event {
                RateLimiterEvent::CallRejected { reason, .. } => {
                    format!("rejected: {}", reason.as_str())
                }
                other => other.event_type().to_string(),
            };
            sink.lock().unwrap().push(entry);
        })
        .build();
    let ctx = CallContext::background();
    let request = RequestInfo::new("GET", "/projects.json", 1);

    hooks.on_request_end(
        &ctx,
        &request,
        &RequestResult::status(429, Duration::ZERO).with_retry_after(10),
    );
    let err = hooks
        .on_operation_gate(&ctx, &OperationInfo::new("Projects", "List"))
        .await
        .unwrap_err();
    assert!(err.is_rate_limited());

    assert_eq!(
        *events.lock().unwrap(),
        vec!["cooldown_started", "rejected: cooldown"]
    );
}

#[tokio::test]
async fn panicking_listener_does_not_break_gating() {
    let hooks = ResilienceHooks::builder()
        .on_bulkhead_event(|_event| panic!("listener bug"))
        .build();
    let op = OperationInfo::new("Todos", "List");

    let value = run_operation(&hooks, CallContext::background(), &op, |_ctx| async {
        Ok::<_, Error>(7)
    })
    .await
    .unwrap();
    assert_eq!(value, 7);
    assert_eq!(hooks.bulkhead_in_use("Todos.List"), Some(0));
}
