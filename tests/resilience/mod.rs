//! Test organization:
//! - end_to_end.rs: breaker trip and recovery through run_operation
//! - concurrency.rs: many operations sharing one context and one bulkhead
//! - cooldown.rs: server backpressure feeding the rate limiter
//! - context.rs: observers that replace the context
//! - stacking.rs: nested with_* wrappers and chains
//! - events.rs: listeners registered on the builder

mod context;
mod cooldown;
mod events;
mod stacking;

pub(crate) mod support {
    use opgate::{Admission, Hooks, OperationInfo};
    use opgate_core::{ApiError, CallContext, Error};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    pub(crate) fn server_error() -> Error {
        Error::Api(ApiError::api(500, "internal server error"))
    }

    /// Records which lifecycle callbacks ran, in order.
    #[derive(Default)]
    pub(crate) struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Hooks for Recorder {
        fn on_operation_start(
            &self,
            ctx: CallContext,
            op: &OperationInfo,
            _admission: &Admission,
        ) -> CallContext {
            self.calls.lock().unwrap().push(format!("start {}", op.scope()));
            ctx
        }

        fn on_operation_end(
            &self,
            _ctx: &CallContext,
            op: &OperationInfo,
            _admission: &Admission,
            error: Option<&Error>,
            _duration: Duration,
        ) {
            let outcome = error.map_or("ok", |err| err.code());
            self.calls
                .lock()
                .unwrap()
                .push(format!("end {} {}", op.scope(), outcome));
        }
    }
}
