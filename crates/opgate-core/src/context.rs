//! The caller's context for one operation.
//!
//! A [`CallContext`] carries the three things the gating layer needs from the
//! caller: an optional cancellation token, an optional deadline and the
//! tracing span observers attach. It carries no resource handles; those travel
//! in explicit tokens returned by the gate.

use crate::error::ContextError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation, deadline and span for one call.
///
/// Cloning is cheap. Many concurrent operations may share clones of the same
/// context; nothing in the layer keys state by context identity.
#[derive(Clone, Debug)]
pub struct CallContext {
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
    span: tracing::Span,
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self {
            cancel: None,
            deadline: None,
            span: tracing::Span::none(),
        }
    }

    /// Ties the context to `token`; cancelling the token cancels the call.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sets an absolute deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Sets a deadline `timeout` from now. An earlier existing deadline is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Replaces the span observers record under.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// The reason the context is done, if it is.
    ///
    /// Cancellation wins over an expired deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is done. Pending forever for a background
    /// context.
    pub async fn done(&self) -> ContextError {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => ContextError::Canceled,
            _ = expired => ContextError::DeadlineExceeded,
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::background()
    }
}
