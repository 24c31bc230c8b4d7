//! Middleware and adapter capabilities, and their type-erased links.
//!
//! - [`Middleware`] - a non-terminal capability with typed, bound options
//! - [`Adapter`] - the terminal capability that performs the exchange
//! - [`Link`] / [`AdapterLink`] - object-safe forms stored in a [`Chain`](crate::Chain)
//!
//! A capability is resolved into a link exactly once, when the chain is
//! built. From then on the runner only sees `dyn Link` and `dyn AdapterLink`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::{Context, Next, Result};

/// Boxed future returned by links.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Future returned by every link and adapter call.
pub type LinkFuture<'a> = BoxFuture<'a, Result<Context>>;

// ============================================================================
// Capabilities
// ============================================================================

/// A non-terminal participant in the pipeline.
///
/// A middleware receives the current [`Context`], the continuation `next`
/// representing the rest of the chain, and the options bound when the chain
/// was built. It may:
///
/// - mutate the context, call `next.run(ctx)`, and return (or transform) its result,
/// - return without calling `next` to short-circuit every downstream link,
/// - call `next.run(ctx)` and recover from or annotate the error it returns.
///
/// `next` may be run at most once; a second run yields
/// [`Error::Misuse`](crate::Error::Misuse).
///
/// # Example
///
/// ```
/// use tessel_core::{BoxFuture, Context, Middleware, Next, Result};
///
/// struct AddHeader;
///
/// impl Middleware for AddHeader {
///     type Options = (String, String);
///
///     fn name(&self) -> &'static str {
///         "add_header"
///     }
///
///     fn call<'a>(
///         &'a self,
///         mut ctx: Context,
///         next: Next<'a>,
///         (name, value): &'a Self::Options,
///     ) -> BoxFuture<'a, Result<Context>> {
///         ctx.put_header(name.clone(), value.clone());
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    /// Options bound to this middleware when the chain is built.
    type Options: Send + Sync + 'static;

    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Check the bound options once, when the chain is built.
    ///
    /// Errors are reported as [`Error::Configuration`](crate::Error::Configuration).
    fn validate(&self, _options: &Self::Options) -> Result<()> {
        Ok(())
    }

    /// Process one exchange.
    fn call<'a>(
        &'a self,
        ctx: Context,
        next: Next<'a>,
        options: &'a Self::Options,
    ) -> LinkFuture<'a>;
}

/// The terminal participant in the pipeline: performs the actual exchange.
///
/// On success the adapter fills in the response fields of the context; on
/// failure it returns a [`TransportError`](crate::TransportError).
pub trait Adapter: Send + Sync + 'static {
    /// Options bound to this adapter when the chain is built.
    type Options: Send + Sync + 'static;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Check the bound options once, when the chain is built.
    fn validate(&self, _options: &Self::Options) -> Result<()> {
        Ok(())
    }

    /// Perform the exchange.
    fn call<'a>(&'a self, ctx: Context, options: &'a Self::Options) -> LinkFuture<'a>;
}

// ============================================================================
// Type-erased links
// ============================================================================

/// Object-safe middleware link with its options already bound.
pub trait Link: Send + Sync {
    /// Name of the underlying middleware.
    fn name(&self) -> &'static str;

    /// Process one exchange.
    fn call<'a>(&'a self, ctx: Context, next: Next<'a>) -> LinkFuture<'a>;
}

/// Object-safe adapter link with its options already bound.
pub trait AdapterLink: Send + Sync {
    /// Name of the underlying adapter.
    fn name(&self) -> &'static str;

    /// Perform the exchange.
    fn call(&self, ctx: Context) -> LinkFuture<'_>;
}

/// A middleware paired with its options.
pub struct Bound<M: Middleware> {
    middleware: M,
    options: M::Options,
}

impl<M: Middleware> Bound<M> {
    /// Bind `options` to `middleware`, validating them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) if the
    /// middleware rejects its options.
    pub fn new(middleware: M, options: M::Options) -> Result<Self> {
        middleware
            .validate(&options)
            .map_err(|err| configuration_for(middleware.name(), err))?;
        Ok(Self {
            middleware,
            options,
        })
    }

    /// The bound options.
    #[must_use]
    pub const fn options(&self) -> &M::Options {
        &self.options
    }
}

impl<M: Middleware> Link for Bound<M> {
    fn name(&self) -> &'static str {
        self.middleware.name()
    }

    fn call<'a>(&'a self, ctx: Context, next: Next<'a>) -> LinkFuture<'a> {
        self.middleware.call(ctx, next, &self.options)
    }
}

impl<M: Middleware> fmt::Debug for Bound<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bound")
            .field("middleware", &self.middleware.name())
            .finish_non_exhaustive()
    }
}

/// An adapter paired with its options.
pub struct BoundAdapter<A: Adapter> {
    adapter: A,
    options: A::Options,
}

impl<A: Adapter> BoundAdapter<A> {
    /// Bind `options` to `adapter`, validating them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) if the
    /// adapter rejects its options.
    pub fn new(adapter: A, options: A::Options) -> Result<Self> {
        adapter
            .validate(&options)
            .map_err(|err| configuration_for(adapter.name(), err))?;
        Ok(Self { adapter, options })
    }
}

impl<A: Adapter> AdapterLink for BoundAdapter<A> {
    fn name(&self) -> &'static str {
        self.adapter.name()
    }

    fn call(&self, ctx: Context) -> LinkFuture<'_> {
        self.adapter.call(ctx, &self.options)
    }
}

impl<A: Adapter> fmt::Debug for BoundAdapter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAdapter")
            .field("adapter", &self.adapter.name())
            .finish_non_exhaustive()
    }
}

fn configuration_for(name: &str, err: crate::Error) -> crate::Error {
    match err {
        crate::Error::Configuration(message) => {
            crate::Error::configuration(format!("{name}: {message}"))
        }
        other => crate::Error::configuration(format!("{name}: {other}")),
    }
}

// ============================================================================
// Resolution helpers
// ============================================================================

/// Resolve a bare middleware into a link, using default options.
///
/// # Errors
///
/// Returns a configuration error if the default options are rejected.
pub fn link<M>(middleware: M) -> Result<Arc<dyn Link>>
where
    M: Middleware,
    M::Options: Default,
{
    link_with(middleware, M::Options::default())
}

/// Resolve a (middleware, options) pair into a link.
///
/// # Errors
///
/// Returns a configuration error if the options are rejected.
pub fn link_with<M: Middleware>(middleware: M, options: M::Options) -> Result<Arc<dyn Link>> {
    Ok(Arc::new(Bound::new(middleware, options)?))
}

/// Resolve an adapter with default options into a terminal link.
///
/// # Errors
///
/// Returns a configuration error if the default options are rejected.
pub fn adapter<A>(adapter: A) -> Result<Arc<dyn AdapterLink>>
where
    A: Adapter,
    A::Options: Default,
{
    adapter_with(adapter, A::Options::default())
}

/// Resolve an (adapter, options) pair into a terminal link.
///
/// # Errors
///
/// Returns a configuration error if the options are rejected.
pub fn adapter_with<A: Adapter>(adapter: A, options: A::Options) -> Result<Arc<dyn AdapterLink>> {
    Ok(Arc::new(BoundAdapter::new(adapter, options)?))
}
