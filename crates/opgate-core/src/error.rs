//! Error taxonomy shared by the gates and the hooks.
//!
//! Errors fall into four families:
//!
//! - **gating rejections** ([`Error::CircuitOpen`], [`Error::BulkheadFull`],
//!   [`Error::RateLimited`]): produced locally, the network was never touched;
//! - **structured API errors** ([`Error::Api`]): carry an [`ErrorCode`], an
//!   optional HTTP status and a retryable flag;
//! - **caller context errors** ([`Error::Context`]): the caller cancelled or ran
//!   out of time. These are always propagated as-is;
//! - **everything else** ([`Error::Other`]).
//!
//! ```rust
//! use opgate_core::{ApiError, Error};
//!
//! let err: Error = ApiError::not_found("todo", "42").into();
//! assert_eq!(err.code(), "not_found");
//! assert_eq!(err.exit_code(), opgate_core::exit::NOT_FOUND);
//! assert!(!err.is_gating());
//! ```

use std::error::Error as StdError;
use std::fmt;

/// Boxed error used for causes the layer does not classify.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Process exit codes for command-line front ends.
pub mod exit {
    /// Success.
    pub const OK: i32 = 0;
    /// Invalid arguments or flags.
    pub const USAGE: i32 = 1;
    /// Resource not found.
    pub const NOT_FOUND: i32 = 2;
    /// Not authenticated.
    pub const AUTH: i32 = 3;
    /// Access denied.
    pub const FORBIDDEN: i32 = 4;
    /// Rate limited, locally or by the server.
    pub const RATE_LIMIT: i32 = 5;
    /// Connection, DNS or timeout failure.
    pub const NETWORK: i32 = 6;
    /// The server returned an error.
    pub const API: i32 = 7;
    /// A name matched more than one resource.
    pub const AMBIGUOUS: i32 = 8;
}

/// The caller gave up before the operation could finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ContextError {
    /// The caller's cancellation token fired.
    #[error("context canceled")]
    Canceled,
    /// The caller's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Classification of a structured API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ErrorCode {
    Usage,
    NotFound,
    Auth,
    Forbidden,
    RateLimit,
    Network,
    Api,
    Validation,
    Ambiguous,
}

impl ErrorCode {
    /// Stable string form, suitable for logs and JSON output.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Usage => "usage",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Auth => "auth_required",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::RateLimit => "rate_limit",
            ErrorCode::Network => "network",
            ErrorCode::Api => "api_error",
            ErrorCode::Validation => "validation",
            ErrorCode::Ambiguous => "ambiguous",
        }
    }

    /// Exit code a CLI should terminate with for this class of error.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCode::Usage | ErrorCode::Validation => exit::USAGE,
            ErrorCode::NotFound => exit::NOT_FOUND,
            ErrorCode::Auth => exit::AUTH,
            ErrorCode::Forbidden => exit::FORBIDDEN,
            ErrorCode::RateLimit => exit::RATE_LIMIT,
            ErrorCode::Network => exit::NETWORK,
            ErrorCode::Api => exit::API,
            ErrorCode::Ambiguous => exit::AMBIGUOUS,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured error reported by the API or the transport.
#[derive(Debug)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub hint: Option<String>,
    /// HTTP status, when a response was received.
    pub http_status: Option<u16>,
    /// Whether the transport considers the failure worth retrying.
    pub retryable: bool,
    pub source: Option<BoxError>,
}

impl ApiError {
    /// Creates an error with the given code and message and nothing else.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
            http_status: None,
            retryable: false,
            source: None,
        }
    }

    /// Attaches a hint shown after the message.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attaches an HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Usage, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message).with_status(422)
    }

    pub fn not_found(resource: &str, identifier: &str) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("{resource} not found: {identifier}"),
        )
        .with_status(404)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Auth, message).with_status(401)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message).with_status(403)
    }

    /// Server-side throttling (HTTP 429). `retry_after` is in seconds, 0 if unknown.
    pub fn rate_limit(retry_after: u64) -> Self {
        let hint = if retry_after > 0 {
            format!("Try again in {retry_after} seconds")
        } else {
            "Try again later".to_string()
        };
        let mut err = Self::new(ErrorCode::RateLimit, "Rate limited")
            .with_hint(hint)
            .with_status(429);
        err.retryable = true;
        err
    }

    /// A connection-level failure; no usable response was received.
    pub fn network(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        let mut err = Self::new(ErrorCode::Network, "Network error").with_hint(source.to_string());
        err.retryable = true;
        err.source = Some(source);
        err
    }

    /// A server response with a non-success status.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorCode::Api, message).with_status(status);
        err.retryable = status >= 500;
        err
    }

    pub fn ambiguous(resource: &str, matches: &[&str]) -> Self {
        let hint = if !matches.is_empty() && matches.len() <= 5 {
            format!("Did you mean: {}", matches.join(", "))
        } else {
            "Be more specific".to_string()
        };
        Self::new(ErrorCode::Ambiguous, format!("Ambiguous {resource}")).with_hint(hint)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{}: {}", self.message, hint),
            None => f.write_str(&self.message),
        }
    }
}

impl StdError for ApiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Every error an operation can end with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The circuit breaker for the operation's scope is open.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The bulkhead for the operation's scope had no free slot in time.
    #[error("bulkhead is full")]
    BulkheadFull,

    /// The client-side rate limiter refused the operation.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The caller cancelled or its deadline passed.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// A structured error from the API or transport.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// An error the layer knows nothing about.
    #[error("{0}")]
    Other(#[source] BoxError),
}

impl Error {
    /// Wraps an arbitrary error as [`Error::Other`].
    pub fn other(err: impl Into<BoxError>) -> Self {
        Error::Other(err.into())
    }

    /// True for the three local admission rejections.
    pub fn is_gating(&self) -> bool {
        matches!(
            self,
            Error::CircuitOpen | Error::BulkheadFull | Error::RateLimited
        )
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Error::CircuitOpen)
    }

    pub fn is_bulkhead_full(&self) -> bool {
        matches!(self, Error::BulkheadFull)
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited)
    }

    /// Finds a [`ContextError`] in this error or anywhere in its source chain.
    ///
    /// A network error whose cause is a cancelled request still reports the
    /// cancellation here.
    pub fn context_error(&self) -> Option<ContextError> {
        if let Error::Context(ctx) = self {
            return Some(*ctx);
        }
        let mut cause = StdError::source(self);
        while let Some(err) = cause {
            if let Some(ctx) = err.downcast_ref::<ContextError>() {
                return Some(*ctx);
            }
            if let Some(Error::Context(ctx)) = err.downcast_ref::<Error>() {
                return Some(*ctx);
            }
            cause = err.source();
        }
        None
    }

    /// The structured error, if this is one.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }

    /// HTTP status carried by a structured error.
    pub fn http_status(&self) -> Option<u16> {
        self.as_api().and_then(|api| api.http_status)
    }

    /// Stable string code for logs and JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            Error::CircuitOpen => "circuit_open",
            Error::BulkheadFull => "bulkhead_full",
            Error::RateLimited => "rate_limited",
            Error::Context(ContextError::Canceled) => "canceled",
            Error::Context(ContextError::DeadlineExceeded) => "deadline_exceeded",
            Error::Api(api) => api.code.as_str(),
            Error::Other(_) => ErrorCode::Api.as_str(),
        }
    }

    /// Exit code a CLI should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::CircuitOpen => exit::API,
            Error::BulkheadFull | Error::RateLimited => exit::RATE_LIMIT,
            Error::Context(_) => exit::NETWORK,
            Error::Api(api) => api.code.exit_code(),
            Error::Other(_) => exit::API,
        }
    }
}

/// Result alias used across the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;
