//! Tower services as terminal adapters.

use std::fmt;

use tessel_core::{Adapter, Context, Error, LinkFuture};
use tower::{Service, ServiceExt};

/// Adapter wrapping a `tower::Service<Context>`.
///
/// The service is cloned for each exchange and driven to readiness before
/// the call, so any tower stack (including another [`Client`](crate::Client))
/// can terminate a chain.
///
/// # Example
///
/// ```ignore
/// use tessel::adapter::ServiceAdapter;
///
/// let inner = Client::builder().adapter(HyperAdapter::new()).build()?;
/// let outer = Client::builder()
///     .with(Logger)
///     .adapter(ServiceAdapter::new(inner))
///     .build()?;
/// ```
#[derive(Clone)]
pub struct ServiceAdapter<S> {
    inner: S,
}

impl<S> ServiceAdapter<S> {
    /// Wrap a service.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S> fmt::Debug for ServiceAdapter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAdapter").finish_non_exhaustive()
    }
}

impl<S> Adapter for ServiceAdapter<S>
where
    S: Service<Context, Response = Context, Error = Error> + Clone + Send + Sync + 'static,
    S::Future: Send,
{
    type Options = ();

    fn name(&self) -> &'static str {
        "service"
    }

    fn call<'a>(&'a self, ctx: Context, _options: &'a ()) -> LinkFuture<'a> {
        let service = self.inner.clone();
        Box::pin(service.oneshot(ctx))
    }
}
