use crate::hooks::{Admission, GatingHooks, Hooks, NoopHooks};
use crate::operation::{OperationInfo, RequestInfo, RequestResult};
use futures::future::BoxFuture;
use opgate_core::{CallContext, Error};
use std::sync::Arc;
use std::time::Duration;

/// Runs several observers as one.
///
/// Start callbacks run in order and end callbacks in reverse, so spans opened
/// by the first member close last. Only one member may gate: the first member
/// whose [`Hooks::as_gating`] returns something takes the admission call, and
/// only that member sees the [`Admission`] it issued.
pub struct ChainHooks {
    hooks: Vec<Arc<dyn Hooks>>,
    gater: Option<usize>,
}

impl ChainHooks {
    /// Combines `hooks`, dropping members that do nothing.
    ///
    /// An empty list yields [`NoopHooks`] and a single member is returned as
    /// is; a chain is only built for two or more members.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(hooks: Vec<Arc<dyn Hooks>>) -> Arc<dyn Hooks> {
        let mut hooks: Vec<_> = hooks.into_iter().filter(|h| !h.is_noop()).collect();
        match hooks.len() {
            0 => Arc::new(NoopHooks),
            1 => hooks.remove(0),
            _ => {
                let gater = hooks.iter().position(|h| h.as_gating().is_some());
                Arc::new(ChainHooks { hooks, gater })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    fn admission_for<'a>(&self, index: usize, admission: &'a Admission) -> &'a Admission {
        if self.gater == Some(index) {
            admission
        } else {
            Admission::unguarded_ref()
        }
    }
}

impl Hooks for ChainHooks {
    fn on_operation_start(
        &self,
        ctx: CallContext,
        op: &OperationInfo,
        admission: &Admission,
    ) -> CallContext {
        self.hooks
            .iter()
            .enumerate()
            .fold(ctx, |ctx, (i, h)| {
                h.on_operation_start(ctx, op, self.admission_for(i, admission))
            })
    }

    fn on_operation_end(
        &self,
        ctx: &CallContext,
        op: &OperationInfo,
        admission: &Admission,
        error: Option<&Error>,
        duration: Duration,
    ) {
        for (i, h) in self.hooks.iter().enumerate().rev() {
            h.on_operation_end(ctx, op, self.admission_for(i, admission), error, duration);
        }
    }

    fn on_request_start(&self, ctx: CallContext, request: &RequestInfo) -> CallContext {
        self.hooks
            .iter()
            .fold(ctx, |ctx, h| h.on_request_start(ctx, request))
    }

    fn on_request_end(&self, ctx: &CallContext, request: &RequestInfo, result: &RequestResult) {
        for h in self.hooks.iter().rev() {
            h.on_request_end(ctx, request, result);
        }
    }

    fn on_retry(&self, ctx: &CallContext, request: &RequestInfo, attempt: u32, error: &Error) {
        for h in &self.hooks {
            h.on_retry(ctx, request, attempt, error);
        }
    }

    fn as_gating(&self) -> Option<&dyn GatingHooks> {
        self.gater.map(|_| self as &dyn GatingHooks)
    }
}

impl GatingHooks for ChainHooks {
    fn on_operation_gate<'a>(
        &'a self,
        ctx: &'a CallContext,
        op: &'a OperationInfo,
    ) -> BoxFuture<'a, Result<Admission, Error>> {
        let gater = self
            .gater
            .and_then(|i| self.hooks.get(i))
            .and_then(|h| h.as_gating());
        match gater {
            Some(gater) => gater.on_operation_gate(ctx, op),
            None => Box::pin(async { Ok(Admission::unguarded()) }),
        }
    }
}

impl std::fmt::Debug for ChainHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainHooks")
            .field("len", &self.hooks.len())
            .field("gater", &self.gater)
            .finish()
    }
}
