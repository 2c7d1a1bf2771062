//! Tower middleware that runs every request as one gated operation.

use crate::hooks::Hooks;
use crate::operation::OperationInfo;
use crate::run::run_operation;
use futures::future::BoxFuture;
use opgate_core::{CallContext, Error};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// A request that knows which operation it performs.
pub trait DescribeOperation {
    /// The operation this request belongs to.
    fn operation(&self) -> OperationInfo;

    /// Context the operation starts from.
    fn context(&self) -> CallContext {
        CallContext::background()
    }

    /// Receives the context handed back by `on_operation_start`, right before
    /// the request is passed on.
    fn set_context(&mut self, ctx: CallContext) {
        let _ = ctx;
    }
}

/// Layer that wraps services in [`OperationService`].
///
/// # Examples
///
/// ```
/// use opgate::{with_resilience, DescribeOperation, NoopHooks, OperationInfo, OperationLayer};
/// use opgate_core::Error;
/// use std::sync::Arc;
/// use tower::{Layer, ServiceExt};
///
/// struct ListTodos;
///
/// impl DescribeOperation for ListTodos {
///     fn operation(&self) -> OperationInfo {
///         OperationInfo::new("Todos", "List")
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Error> {
/// let hooks = with_resilience(Arc::new(NoopHooks), None);
/// let service = OperationLayer::new(hooks)
///     .layer(tower::service_fn(|_req: ListTodos| async { Ok::<_, Error>(3usize) }));
///
/// let count = service.oneshot(ListTodos).await?;
/// assert_eq!(count, 3);
/// # Ok(())
/// # }
/// ```
pub struct OperationLayer<H: ?Sized> {
    hooks: Arc<H>,
}

impl<H: Hooks + ?Sized> OperationLayer<H> {
    pub fn new(hooks: Arc<H>) -> Self {
        Self { hooks }
    }
}

impl<H: ?Sized> Clone for OperationLayer<H> {
    fn clone(&self) -> Self {
        Self {
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<S, H: Hooks + ?Sized> Layer<S> for OperationLayer<H> {
    type Service = OperationService<S, H>;

    fn layer(&self, inner: S) -> Self::Service {
        OperationService {
            inner,
            hooks: Arc::clone(&self.hooks),
        }
    }
}

/// Service that gates, observes and then forwards each request.
///
/// A rejected request never reaches the inner service; the gate error is
/// returned as the response error.
pub struct OperationService<S, H: ?Sized> {
    inner: S,
    hooks: Arc<H>,
}

impl<S: Clone, H: ?Sized> Clone for OperationService<S, H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<S, H, Req> Service<Req> for OperationService<S, H>
where
    S: Service<Req, Error = Error> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    H: Hooks + ?Sized + 'static,
    Req: DescribeOperation + Send + 'static,
{
    type Response = S::Response;
    type Error = Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Req) -> Self::Future {
        // Keep the instance that was polled ready.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let hooks = Arc::clone(&self.hooks);

        Box::pin(async move {
            let op = request.operation();
            let ctx = request.context();
            run_operation(&*hooks, ctx, &op, move |ctx| {
                request.set_context(ctx);
                inner.call(request)
            })
            .await
        })
    }
}
