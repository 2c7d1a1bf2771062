use crate::hooks::{Admission, Hooks};
use crate::operation::{OperationInfo, RequestInfo, RequestResult};
use opgate_core::{CallContext, Error};
use std::time::Duration;
use tracing::Level;

// `tracing` macros need a constant level; dispatch on the runtime one.
macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            Level::ERROR => tracing::event!(Level::ERROR, $($arg)+),
            Level::WARN => tracing::event!(Level::WARN, $($arg)+),
            Level::INFO => tracing::event!(Level::INFO, $($arg)+),
            Level::DEBUG => tracing::event!(Level::DEBUG, $($arg)+),
            _ => tracing::event!(Level::TRACE, $($arg)+),
        }
    };
}

/// Structured logging for operations and HTTP attempts.
///
/// Every callback logs one event at the configured level (`DEBUG` by
/// default). `on_operation_start` also opens an `operation` span and attaches
/// it to the returned context, so events logged under that context carry the
/// service and operation.
#[derive(Debug, Clone)]
pub struct TracingHooks {
    level: Level,
}

impl TracingHooks {
    pub fn new() -> Self {
        Self {
            level: Level::DEBUG,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for TracingHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl Hooks for TracingHooks {
    fn on_operation_start(
        &self,
        ctx: CallContext,
        op: &OperationInfo,
        _admission: &Admission,
    ) -> CallContext {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "operation",
            service = %op.service,
            operation = %op.operation,
        );
        span.in_scope(|| {
            event_at!(
                self.level,
                resource_type = %op.resource_type,
                is_mutation = op.is_mutation,
                "operation start"
            )
        });
        ctx.with_span(span)
    }

    fn on_operation_end(
        &self,
        ctx: &CallContext,
        op: &OperationInfo,
        _admission: &Admission,
        error: Option<&Error>,
        duration: Duration,
    ) {
        let _entered = ctx.span().enter();
        match error {
            Some(err) => event_at!(
                self.level,
                service = %op.service,
                operation = %op.operation,
                duration_ms = duration.as_millis() as u64,
                error = %err,
                code = err.code(),
                "operation failed"
            ),
            None => event_at!(
                self.level,
                service = %op.service,
                operation = %op.operation,
                duration_ms = duration.as_millis() as u64,
                "operation complete"
            ),
        }
    }

    fn on_request_start(&self, ctx: CallContext, request: &RequestInfo) -> CallContext {
        {
            let _entered = ctx.span().enter();
            event_at!(
                self.level,
                method = %request.method,
                url = %request.url,
                attempt = request.attempt,
                "request start"
            );
        }
        ctx
    }

    fn on_request_end(&self, ctx: &CallContext, request: &RequestInfo, result: &RequestResult) {
        let _entered = ctx.span().enter();
        match &result.error {
            Some(err) => event_at!(
                self.level,
                method = %request.method,
                url = %request.url,
                duration_ms = result.duration.as_millis() as u64,
                error = %err,
                retryable = result.retryable,
                "request failed"
            ),
            None => event_at!(
                self.level,
                method = %request.method,
                url = %request.url,
                duration_ms = result.duration.as_millis() as u64,
                status = result.status_code,
                from_cache = result.from_cache,
                "request complete"
            ),
        }
    }

    fn on_retry(&self, ctx: &CallContext, request: &RequestInfo, attempt: u32, error: &Error) {
        let _entered = ctx.span().enter();
        event_at!(
            self.level,
            method = %request.method,
            url = %request.url,
            attempt,
            error = %error,
            "request retry"
        );
    }
}
