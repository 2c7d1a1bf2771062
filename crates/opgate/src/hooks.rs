//! The observer contract and the admission call in front of it.
//!
//! Every operation goes through the same lifecycle:
//!
//! 1. [`GatingHooks::on_operation_gate`] decides whether the operation may run
//!    and hands back an [`Admission`].
//! 2. [`Hooks::on_operation_start`] observes the start and may replace the
//!    context.
//! 3. Per HTTP attempt: [`Hooks::on_request_start`], [`Hooks::on_request_end`]
//!    and, between attempts, [`Hooks::on_retry`].
//! 4. [`Hooks::on_operation_end`] observes the outcome and frees whatever the
//!    gate reserved.
//!
//! Whatever the gate reserved is identified by the [`Admission`] token, which
//! the caller threads from the gate to start and end. Nothing is stored in the
//! context, so observers are free to hand back a brand new one.

use crate::operation::{OperationInfo, RequestInfo, RequestResult};
use futures::future::BoxFuture;
use opgate_core::{CallContext, Error};
use std::time::Duration;

/// Observer of operations and HTTP attempts.
///
/// Every method has a no-op default, so an implementation only overrides what
/// it cares about. Methods run on the caller's task and must not block.
pub trait Hooks: Send + Sync {
    /// An operation is starting. The returned context is used for the rest of
    /// the operation.
    fn on_operation_start(
        &self,
        ctx: CallContext,
        op: &OperationInfo,
        admission: &Admission,
    ) -> CallContext {
        let _ = (op, admission);
        ctx
    }

    /// An operation finished, successfully when `error` is `None`.
    fn on_operation_end(
        &self,
        ctx: &CallContext,
        op: &OperationInfo,
        admission: &Admission,
        error: Option<&Error>,
        duration: Duration,
    ) {
        let _ = (ctx, op, admission, error, duration);
    }

    /// An HTTP attempt is about to be sent.
    fn on_request_start(&self, ctx: CallContext, request: &RequestInfo) -> CallContext {
        let _ = request;
        ctx
    }

    /// An HTTP attempt finished.
    fn on_request_end(&self, ctx: &CallContext, request: &RequestInfo, result: &RequestResult) {
        let _ = (ctx, request, result);
    }

    /// The transport is about to retry after `error`.
    fn on_retry(&self, ctx: &CallContext, request: &RequestInfo, attempt: u32, error: &Error) {
        let _ = (ctx, request, attempt, error);
    }

    /// The gating side of this observer, if it has one.
    ///
    /// Lets callers holding a `dyn Hooks` find the admission call without
    /// knowing the concrete type.
    fn as_gating(&self) -> Option<&dyn GatingHooks> {
        None
    }

    /// True for observers that do nothing; chains skip them.
    fn is_noop(&self) -> bool {
        false
    }
}

/// An observer that can also refuse operations before they start.
pub trait GatingHooks: Hooks {
    /// Decides whether `op` may run.
    ///
    /// On success the returned [`Admission`] must be passed to
    /// `on_operation_start` and `on_operation_end`. On error the operation
    /// must not run and neither start nor end is called.
    fn on_operation_gate<'a>(
        &'a self,
        ctx: &'a CallContext,
        op: &'a OperationInfo,
    ) -> BoxFuture<'a, Result<Admission, Error>>;
}

static UNGUARDED: Admission = Admission {
    release: None,
    trial: None,
    inner: None,
};

/// Proof that an operation passed the gate, naming what it reserved.
///
/// Opaque to callers. An admission is consumed by exactly one operation; end
/// releases what it names at most once no matter how often it is presented.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Admission {
    release: Option<u64>,
    trial: Option<u64>,
    inner: Option<Box<Admission>>,
}

impl Admission {
    /// Admission for an operation nothing gated.
    pub fn unguarded() -> Self {
        Self::default()
    }

    /// Whether anything was reserved for this operation.
    pub fn is_tracked(&self) -> bool {
        self.release.is_some()
            || self.trial.is_some()
            || self.inner.as_ref().is_some_and(|inner| inner.is_tracked())
    }

    pub(crate) fn tracked(release: Option<u64>, trial: Option<u64>) -> Self {
        Self {
            release,
            trial,
            inner: None,
        }
    }

    pub(crate) fn nest(mut self, inner: Admission) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    pub(crate) fn release_id(&self) -> Option<u64> {
        self.release
    }

    /// The half-open circuit trial the operation holds, if any.
    pub(crate) fn trial(&self) -> Option<u64> {
        self.trial
    }

    /// The admission issued by a nested gater.
    pub(crate) fn inner(&self) -> &Admission {
        self.inner.as_deref().unwrap_or(&UNGUARDED)
    }

    pub(crate) fn unguarded_ref() -> &'static Admission {
        &UNGUARDED
    }
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl Hooks for NoopHooks {
    fn is_noop(&self) -> bool {
        true
    }
}
