use crate::hooks::{Admission, Hooks};
use crate::operation::{OperationInfo, RequestInfo, RequestResult};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use opgate_core::{CallContext, Error};
use std::sync::Once;
use std::time::Duration;

static METRICS_INIT: Once = Once::new();

/// Records operation and HTTP metrics through the `metrics` facade.
///
/// | Metric | Labels |
/// |---|---|
/// | `opgate_operation_duration_seconds` (histogram) | `operation` |
/// | `opgate_operations_total` | `operation`, `status` |
/// | `opgate_http_requests_total` | `http_method`, `status_code` |
/// | `opgate_retries_total` | `http_method` |
/// | `opgate_cache_operations_total` | `result` |
/// | `opgate_errors_total` | `http_method`, `type` |
#[derive(Debug, Clone, Copy)]
pub struct MetricsHooks {
    _priv: (),
}

impl MetricsHooks {
    pub fn new() -> Self {
        METRICS_INIT.call_once(|| {
            describe_histogram!(
                "opgate_operation_duration_seconds",
                Unit::Seconds,
                "Duration of client operations"
            );
            describe_counter!("opgate_operations_total", "Total number of client operations");
            describe_counter!(
                "opgate_http_requests_total",
                "Total number of HTTP requests sent"
            );
            describe_counter!("opgate_retries_total", "Total number of request retries");
            describe_counter!(
                "opgate_cache_operations_total",
                "Cache hits and misses for GET requests"
            );
            describe_counter!("opgate_errors_total", "Total number of failed requests");
        });
        Self { _priv: () }
    }
}

impl Default for MetricsHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl Hooks for MetricsHooks {
    fn on_operation_end(
        &self,
        _ctx: &CallContext,
        op: &OperationInfo,
        _admission: &Admission,
        error: Option<&Error>,
        duration: Duration,
    ) {
        let operation = op.scope();
        histogram!("opgate_operation_duration_seconds", "operation" => operation.clone())
            .record(duration.as_secs_f64());

        let status = if error.is_some() { "error" } else { "success" };
        counter!("opgate_operations_total", "operation" => operation, "status" => status)
            .increment(1);
    }

    fn on_request_end(&self, _ctx: &CallContext, request: &RequestInfo, result: &RequestResult) {
        let method = request.method.clone();

        counter!(
            "opgate_http_requests_total",
            "http_method" => method.clone(),
            "status_code" => status_label(result.status_code)
        )
        .increment(1);

        if method == "GET" {
            let outcome = if result.from_cache { "hit" } else { "miss" };
            counter!("opgate_cache_operations_total", "result" => outcome).increment(1);
        }

        if result.error.is_some() {
            counter!(
                "opgate_errors_total",
                "http_method" => method,
                "type" => error_type(result.status_code)
            )
            .increment(1);
        }
    }

    fn on_retry(&self, _ctx: &CallContext, request: &RequestInfo, _attempt: u32, _error: &Error) {
        counter!("opgate_retries_total", "http_method" => request.method.clone()).increment(1);
    }
}

/// Exact label for common statuses, the class for the rest.
fn status_label(code: u16) -> &'static str {
    match code {
        0 => "0",
        200 => "200",
        201 => "201",
        204 => "204",
        304 => "304",
        400 => "400",
        401 => "401",
        403 => "403",
        404 => "404",
        429 => "429",
        500 => "500",
        502 => "502",
        503 => "503",
        504 => "504",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500.. => "5xx",
        _ => "unknown",
    }
}

/// Failure category; status 0 means no response arrived.
fn error_type(code: u16) -> &'static str {
    match code {
        0 => "network",
        401 => "auth",
        403 => "forbidden",
        404 => "not_found",
        429 => "rate_limit",
        500 => "server",
        502..=504 => "gateway",
        400..=499 => "client",
        _ => "unknown",
    }
}
