use opgate::{
    with_bulkhead, Admission, BulkheadConfig, ChainHooks, GatingHooks, Hooks, NoopHooks,
    OperationInfo, RequestInfo, RequestResult,
};
use opgate_core::{CallContext, Error};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Trace = Arc<Mutex<Vec<String>>>;

struct Named {
    name: &'static str,
    trace: Trace,
}

impl Named {
    fn hooks(name: &'static str, trace: &Trace) -> Arc<dyn Hooks> {
        Arc::new(Self {
            name,
            trace: Arc::clone(trace),
        })
    }

    fn push(&self, what: &str) {
        self.trace.lock().unwrap().push(format!("{} {what}", self.name));
    }
}

impl Hooks for Named {
    fn on_operation_start(
        &self,
        ctx: CallContext,
        _op: &OperationInfo,
        _admission: &Admission,
    ) -> CallContext {
        self.push("start");
        ctx
    }

    fn on_operation_end(
        &self,
        _ctx: &CallContext,
        _op: &OperationInfo,
        _admission: &Admission,
        _error: Option<&Error>,
        _duration: Duration,
    ) {
        self.push("end");
    }

    fn on_request_start(&self, ctx: CallContext, _request: &RequestInfo) -> CallContext {
        self.push("request_start");
        ctx
    }

    fn on_request_end(&self, _ctx: &CallContext, _request: &RequestInfo, _result: &RequestResult) {
        self.push("request_end");
    }

    fn on_retry(&self, _ctx: &CallContext, _request: &RequestInfo, attempt: u32, _error: &Error) {
        self.push(&format!("retry {attempt}"));
    }
}

#[test]
fn start_forward_end_reverse() {
    let trace = Trace::default();
    let chain = ChainHooks::new(vec![Named::hooks("a", &trace), Named::hooks("b", &trace)]);
    let op = OperationInfo::new("Todos", "List");
    let admission = Admission::unguarded();
    let request = RequestInfo::new("GET", "/todos.json", 1);

    let ctx = chain.on_operation_start(CallContext::background(), &op, &admission);
    let ctx = chain.on_request_start(ctx, &request);
    chain.on_request_end(&ctx, &request, &RequestResult::status(500, Duration::ZERO));
    chain.on_retry(&ctx, &request, 2, &Error::other("server error"));
    chain.on_operation_end(&ctx, &op, &admission, None, Duration::ZERO);

    assert_eq!(
        *trace.lock().unwrap(),
        vec![
            "a start",
            "b start",
            "a request_start",
            "b request_start",
            "b request_end",
            "a request_end",
            "a retry 2",
            "b retry 2",
            "b end",
            "a end",
        ]
    );
}

#[test]
fn degenerate_chains_collapse() {
    let noop: Arc<dyn Hooks> = Arc::new(NoopHooks);
    assert!(ChainHooks::new(Vec::new()).is_noop());
    assert!(ChainHooks::new(vec![noop.clone(), noop]).is_noop());

    let trace = Trace::default();
    let single = ChainHooks::new(vec![Named::hooks("only", &trace)]);
    assert!(!single.is_noop());
    single.on_operation_start(
        CallContext::background(),
        &OperationInfo::new("Todos", "List"),
        &Admission::unguarded(),
    );
    assert_eq!(*trace.lock().unwrap(), vec!["only start"]);
}

#[tokio::test]
async fn chain_without_gater_does_not_gate() {
    let trace = Trace::default();
    let chain = ChainHooks::new(vec![Named::hooks("a", &trace), Named::hooks("b", &trace)]);
    assert!(chain.as_gating().is_none());
}

#[tokio::test]
async fn first_gater_takes_admission() {
    let first = with_bulkhead(Arc::new(NoopHooks), Some(BulkheadConfig::new(1, None)));
    let second = with_bulkhead(Arc::new(NoopHooks), Some(BulkheadConfig::new(1, None)));
    let a: Arc<dyn Hooks> = first.clone();
    let b: Arc<dyn Hooks> = second.clone();
    let chain = ChainHooks::new(vec![a, b]);
    let op = OperationInfo::new("Todos", "List");
    let ctx = CallContext::background();

    let gater = chain.as_gating().unwrap();
    let admission = gater.on_operation_gate(&ctx, &op).await.unwrap();
    assert_eq!(first.bulkhead_in_use("Todos.List"), Some(1));
    assert_eq!(second.bulkhead_in_use("Todos.List"), None);

    let ctx = chain.on_operation_start(ctx, &op, &admission);
    chain.on_operation_end(&ctx, &op, &admission, None, Duration::ZERO);
    assert_eq!(first.bulkhead_in_use("Todos.List"), Some(0));
    assert_eq!(first.outstanding_releases(), 0);
}
