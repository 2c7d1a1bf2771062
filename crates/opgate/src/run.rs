use crate::hooks::{Admission, Hooks};
use crate::operation::OperationInfo;
use opgate_core::{CallContext, ContextError, Error};
use std::future::Future;
use tokio::time::Instant;

/// Runs `f` as one gated, observed operation.
///
/// Performs the whole lifecycle: the gate (when `hooks` gates), start, the
/// call itself and end. A gate rejection is returned as is and `f` never
/// runs. End is reported exactly once, including when the returned future is
/// dropped before `f` finishes, in which case the operation ends with
/// `Error::Context(Canceled)`.
///
/// ```rust
/// use opgate::{run_operation, with_resilience, NoopHooks, OperationInfo};
/// use opgate_core::{CallContext, Error};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Error> {
/// let hooks = with_resilience(Arc::new(NoopHooks), None);
/// let op = OperationInfo::new("Todos", "List").with_resource_type("todo");
///
/// let todos = run_operation(&*hooks, CallContext::background(), &op, |_ctx| async {
///     Ok::<_, Error>(vec!["write docs"])
/// })
/// .await?;
/// assert_eq!(todos.len(), 1);
/// # Ok(())
/// # }
/// ```
pub async fn run_operation<H, T, F, Fut>(
    hooks: &H,
    ctx: CallContext,
    op: &OperationInfo,
    f: F,
) -> Result<T, Error>
where
    H: Hooks + ?Sized,
    F: FnOnce(CallContext) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let admission = match hooks.as_gating() {
        Some(gater) => gater.on_operation_gate(&ctx, op).await?,
        None => Admission::unguarded(),
    };

    let started = Instant::now();
    let ctx = hooks.on_operation_start(ctx, op, &admission);
    let guard = EndGuard {
        hooks,
        ctx: ctx.clone(),
        op,
        admission,
        started,
        ended: false,
    };

    let result = f(ctx).await;
    guard.end(result.as_ref().err());
    result
}

struct EndGuard<'a, H: Hooks + ?Sized> {
    hooks: &'a H,
    ctx: CallContext,
    op: &'a OperationInfo,
    admission: Admission,
    started: Instant,
    ended: bool,
}

impl<H: Hooks + ?Sized> EndGuard<'_, H> {
    fn end(mut self, error: Option<&Error>) {
        self.report(error);
    }

    fn report(&mut self, error: Option<&Error>) {
        self.ended = true;
        self.hooks.on_operation_end(
            &self.ctx,
            self.op,
            &self.admission,
            error,
            self.started.elapsed(),
        );
    }
}

impl<H: Hooks + ?Sized> Drop for EndGuard<'_, H> {
    fn drop(&mut self) {
        if !self.ended {
            let abandoned = Error::Context(ContextError::Canceled);
            self.report(Some(&abandoned));
        }
    }
}
