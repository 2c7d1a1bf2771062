//! Descriptions of what is being gated and observed.

use opgate_core::Error;
use std::time::Duration;

/// One semantic client operation, e.g. `Todos.Complete`.
///
/// Carries business meaning the HTTP layer does not have, so gates and
/// observers key on `Todos.Complete` rather than `POST /buckets/1/todos/2`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationInfo {
    /// Logical service, e.g. `"Todos"`.
    pub service: String,
    /// Method on the service, e.g. `"Complete"`.
    pub operation: String,
    /// Resource type, e.g. `"todo"`.
    pub resource_type: String,
    /// Whether the operation modifies state.
    pub is_mutation: bool,
    /// Project/bucket the operation targets, if any.
    pub bucket_id: Option<i64>,
    /// Resource the operation targets, if any.
    pub resource_id: Option<i64>,
}

impl OperationInfo {
    pub fn new(service: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            ..Self::default()
        }
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    pub fn mutation(mut self) -> Self {
        self.is_mutation = true;
        self
    }

    pub fn with_bucket_id(mut self, bucket_id: i64) -> Self {
        self.bucket_id = Some(bucket_id);
        self
    }

    pub fn with_resource_id(mut self, resource_id: i64) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    /// Registry key for per-scope gates: `Service.Operation`.
    pub fn scope(&self) -> String {
        format!("{}.{}", self.service, self.operation)
    }
}

/// One physical HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    /// 1 for the first attempt.
    pub attempt: u32,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, url: impl Into<String>, attempt: u32) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            attempt,
        }
    }
}

/// Outcome of one HTTP attempt.
#[derive(Debug, Default)]
pub struct RequestResult {
    /// HTTP status, 0 when no response was received.
    pub status_code: u16,
    pub duration: Duration,
    pub error: Option<Error>,
    /// Served from the client's HTTP cache.
    pub from_cache: bool,
    /// The transport will retry this attempt.
    pub retryable: bool,
    /// Server's `Retry-After` in whole seconds, 0 if absent.
    pub retry_after: u64,
}

impl RequestResult {
    /// A response that arrived with `status_code`.
    pub fn status(status_code: u16, duration: Duration) -> Self {
        Self {
            status_code,
            duration,
            ..Self::default()
        }
    }

    /// An attempt that failed before any response arrived.
    pub fn failed(error: Error, duration: Duration) -> Self {
        Self {
            duration,
            retryable: true,
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn with_error(mut self, error: Error) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = seconds;
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn cached(mut self) -> Self {
        self.from_cache = true;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..400).contains(&self.status_code)
    }
}
