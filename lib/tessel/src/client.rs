//! The client: a bound chain plus request defaults.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use serde_json::Value;
use tessel_core::{
    Adapter, AdapterLink, Body, Chain, Context, Error, Headers, Link, Method, Middleware, Result,
    adapter_with, link_with,
};
use tower::Service;
use tracing::debug;

use crate::config::{ClientConfig, ClientConfigBuilder};

#[cfg(feature = "middleware-decompression")]
use crate::middleware::Decompression;
#[cfg(feature = "middleware-metrics")]
use crate::middleware::Metrics;
#[cfg(feature = "middleware-rate-limit")]
use crate::middleware::RateLimit;
use crate::middleware::{
    BasicAuth, BasicCredentials, BearerAuth, CircuitBreaker, CircuitBreakerConfig, Json, LogLevel,
    Logger, PATH_PARAMS_KEY, PathParams, SetHeaders, Timeout,
};

/// Future type for the Tower Service implementation.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Context>> + Send + 'static>>;

// ============================================================================
// Per-call options
// ============================================================================

/// Per-call overrides merged over the client defaults.
///
/// # Example
///
/// ```ignore
/// let options = RequestOptions::new()
///     .header("X-Request-Id", "42")
///     .query("page", "2")
///     .path_param("id", 7);
///
/// let ctx = client.get("/users/{id}", options).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    headers: Headers,
    query: Vec<(String, String)>,
    scratch: HashMap<String, Value>,
}

impl RequestOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header for this call, replacing a default header of the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append a query value.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Store a value in the context scratch space.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.scratch.insert(key.into(), value.into());
        self
    }

    /// Add a path parameter for the path-params middleware.
    #[must_use]
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let params = self
            .scratch
            .entry(PATH_PARAMS_KEY.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Value::Object(map) = params {
            map.insert(name.into(), value.into());
        }
        self
    }
}

// ============================================================================
// Client
// ============================================================================

// Only a scheme before the first path, query or fragment delimiter counts.
fn is_absolute(url: &str) -> bool {
    url.split_once("://")
        .is_some_and(|(scheme, _)| !scheme.is_empty() && !scheme.contains(['/', '?', '#']))
}

#[derive(Debug)]
struct Defaults {
    base_url: Option<String>,
    headers: Headers,
}

/// HTTP client made of a middleware chain and a terminal adapter.
///
/// A client is immutable once built. Clones share the chain, and any number
/// of calls may run concurrently: each call gets its own [`Context`].
///
/// Every verb comes in two shapes: the safe one returns
/// `Result<Context>`, the `*_or_panic` one panics on error.
///
/// # Example
///
/// ```ignore
/// use tessel::{Client, RequestOptions, middleware::{Json, Logger}};
///
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .with(Logger)
///     .with(Json)
///     .hyper()
///     .build()?;
///
/// let ctx = client.get("/users/1", RequestOptions::new()).await?;
/// let user: User = ctx.response_json()?;
/// ```
#[derive(Clone)]
pub struct Client {
    chain: Chain,
    defaults: Arc<Defaults>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("chain", &self.chain)
            .field("base_url", &self.defaults.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Build a client from resolved links and an optional adapter.
    ///
    /// When `adapter` is `None`, the default adapter of `config` is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when neither an adapter nor a
    /// default adapter is available.
    pub fn new(
        links: Vec<Arc<dyn Link>>,
        adapter: Option<Arc<dyn AdapterLink>>,
        config: &ClientConfig,
    ) -> Result<Self> {
        let adapter = match adapter {
            Some(adapter) => adapter,
            None => config.resolve_default_adapter()?.ok_or_else(|| {
                Error::configuration("no adapter given and no default adapter configured")
            })?,
        };

        let chain = Chain::new(links, adapter);
        debug!(links = ?chain.names(), "client built");

        Ok(Self {
            chain,
            defaults: Arc::new(Defaults {
                base_url: config.base_url.clone(),
                headers: config.headers.clone(),
            }),
        })
    }

    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The bound chain.
    #[must_use]
    pub const fn chain(&self) -> &Chain {
        &self.chain
    }

    /// The base URL prepended to relative paths.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.defaults.base_url.as_deref()
    }

    /// Build the initial context for a call, merging client defaults.
    #[must_use]
    pub fn context(
        &self,
        method: Method,
        url: &str,
        body: Body,
        options: RequestOptions,
    ) -> Context {
        let mut ctx = Context::new(method, self.resolve_url(url));

        for (name, value) in &self.defaults.headers {
            ctx.append_header(name.clone(), value.clone());
        }
        for (name, value) in options.headers {
            ctx.put_header(name, value);
        }
        for (name, value) in options.query {
            ctx.append_query(name, value);
        }
        ctx.scratch_mut().extend(options.scratch);
        ctx.set_body(body);

        ctx
    }

    fn resolve_url(&self, url: &str) -> String {
        match &self.defaults.base_url {
            Some(base) if !is_absolute(url) => {
                let base = base.trim_end_matches('/');
                let path = url.trim_start_matches('/');
                if path.is_empty() {
                    base.to_string()
                } else {
                    format!("{base}/{path}")
                }
            }
            _ => url.to_string(),
        }
    }

    /// Run a prepared context through the chain.
    pub async fn run(&self, ctx: Context) -> Result<Context> {
        self.chain.run(ctx).await
    }

    /// Perform a request with any method.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: impl Into<Body>,
        options: RequestOptions,
    ) -> Result<Context> {
        let ctx = self.context(method, url, body.into(), options);
        self.chain.run(ctx).await
    }

    /// Perform a request with any method, panicking on error.
    ///
    /// # Panics
    ///
    /// Panics if the chain returns an error.
    pub async fn request_or_panic(
        &self,
        method: Method,
        url: &str,
        body: impl Into<Body>,
        options: RequestOptions,
    ) -> Context {
        match self.request(method, url, body, options).await {
            Ok(ctx) => ctx,
            Err(err) => panic!("{method} {url} failed: {err}"),
        }
    }

    // ------------------------------------------------------------------
    // Verbs without a body
    // ------------------------------------------------------------------

    /// Perform a GET request.
    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Context> {
        self.request(Method::Get, url, Body::Empty, options).await
    }

    /// Perform a GET request, panicking on error.
    ///
    /// # Panics
    ///
    /// Panics if the chain returns an error.
    pub async fn get_or_panic(&self, url: &str, options: RequestOptions) -> Context {
        self.request_or_panic(Method::Get, url, Body::Empty, options)
            .await
    }

    /// Perform a HEAD request.
    pub async fn head(&self, url: &str, options: RequestOptions) -> Result<Context> {
        self.request(Method::Head, url, Body::Empty, options).await
    }

    /// Perform a HEAD request, panicking on error.
    ///
    /// # Panics
    ///
    /// Panics if the chain returns an error.
    pub async fn head_or_panic(&self, url: &str, options: RequestOptions) -> Context {
        self.request_or_panic(Method::Head, url, Body::Empty, options)
            .await
    }

    /// Perform a DELETE request.
    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<Context> {
        self.request(Method::Delete, url, Body::Empty, options).await
    }

    /// Perform a DELETE request, panicking on error.
    ///
    /// # Panics
    ///
    /// Panics if the chain returns an error.
    pub async fn delete_or_panic(&self, url: &str, options: RequestOptions) -> Context {
        self.request_or_panic(Method::Delete, url, Body::Empty, options)
            .await
    }

    /// Perform an OPTIONS request.
    pub async fn options(&self, url: &str, options: RequestOptions) -> Result<Context> {
        self.request(Method::Options, url, Body::Empty, options)
            .await
    }

    /// Perform an OPTIONS request, panicking on error.
    ///
    /// # Panics
    ///
    /// Panics if the chain returns an error.
    pub async fn options_or_panic(&self, url: &str, options: RequestOptions) -> Context {
        self.request_or_panic(Method::Options, url, Body::Empty, options)
            .await
    }

    /// Perform a TRACE request.
    pub async fn trace(&self, url: &str, options: RequestOptions) -> Result<Context> {
        self.request(Method::Trace, url, Body::Empty, options).await
    }

    /// Perform a TRACE request, panicking on error.
    ///
    /// # Panics
    ///
    /// Panics if the chain returns an error.
    pub async fn trace_or_panic(&self, url: &str, options: RequestOptions) -> Context {
        self.request_or_panic(Method::Trace, url, Body::Empty, options)
            .await
    }

    // ------------------------------------------------------------------
    // Verbs with a body
    // ------------------------------------------------------------------

    /// Perform a POST request.
    pub async fn post(
        &self,
        url: &str,
        body: impl Into<Body>,
        options: RequestOptions,
    ) -> Result<Context> {
        self.request(Method::Post, url, body, options).await
    }

    /// Perform a POST request, panicking on error.
    ///
    /// # Panics
    ///
    /// Panics if the chain returns an error.
    pub async fn post_or_panic(
        &self,
        url: &str,
        body: impl Into<Body>,
        options: RequestOptions,
    ) -> Context {
        self.request_or_panic(Method::Post, url, body, options).await
    }

    /// Perform a PUT request.
    pub async fn put(
        &self,
        url: &str,
        body: impl Into<Body>,
        options: RequestOptions,
    ) -> Result<Context> {
        self.request(Method::Put, url, body, options).await
    }

    /// Perform a PUT request, panicking on error.
    ///
    /// # Panics
    ///
    /// Panics if the chain returns an error.
    pub async fn put_or_panic(
        &self,
        url: &str,
        body: impl Into<Body>,
        options: RequestOptions,
    ) -> Context {
        self.request_or_panic(Method::Put, url, body, options).await
    }

    /// Perform a PATCH request.
    pub async fn patch(
        &self,
        url: &str,
        body: impl Into<Body>,
        options: RequestOptions,
    ) -> Result<Context> {
        self.request(Method::Patch, url, body, options).await
    }

    /// Perform a PATCH request, panicking on error.
    ///
    /// # Panics
    ///
    /// Panics if the chain returns an error.
    pub async fn patch_or_panic(
        &self,
        url: &str,
        body: impl Into<Body>,
        options: RequestOptions,
    ) -> Context {
        self.request_or_panic(Method::Patch, url, body, options)
            .await
    }
}

// ============================================================================
// Tower Service Implementation
// ============================================================================

impl Service<Context> for Client {
    type Response = Context;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Context) -> Self::Future {
        let chain = self.chain.clone();
        Box::pin(async move { chain.run(ctx).await })
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Client`].
///
/// Links run in registration order: first added = outermost (sees the
/// request first and the response last).
///
/// # Example
///
/// ```ignore
/// use tessel::Client;
/// use tessel::middleware::{BearerAuth, Json, Logger};
///
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .with(Logger)
///     .with_options(BearerAuth, "my-token".to_string())
///     .with(Json)
///     .hyper()
///     .build()?;
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfigBuilder,
    links: Vec<Arc<dyn Link>>,
    adapter: Option<Arc<dyn AdapterLink>>,
    error: Option<Error>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("links", &self.links.iter().map(|l| l.name()).collect::<Vec<_>>())
            .field("adapter", &self.adapter.as_ref().map(|a| a.name()))
            .field("error", &self.error)
            .finish()
    }
}

impl ClientBuilder {
    // ========================================================================
    // Core Configuration
    // ========================================================================

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfigBuilder) -> Self {
        self.config = config;
        self
    }

    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config = self.config.base_url(base_url);
        self
    }

    /// Add a default header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config = self.config.header(name, value);
        self
    }

    /// Set the request timeout used by the hyper transport.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Set the connection timeout used by the hyper transport.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.connect_timeout(timeout);
        self
    }

    // ========================================================================
    // Generic Link API
    // ========================================================================

    fn push(mut self, link: Result<Arc<dyn Link>>) -> Self {
        match link {
            Ok(link) => self.links.push(link),
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    /// Add a bare middleware with its default options.
    #[must_use]
    pub fn with<M>(self, middleware: M) -> Self
    where
        M: Middleware,
        M::Options: Default,
    {
        self.with_options(middleware, M::Options::default())
    }

    /// Add a middleware with explicit options.
    ///
    /// Options are validated now; a rejection surfaces from [`build`](Self::build).
    #[must_use]
    pub fn with_options<M: Middleware>(self, middleware: M, options: M::Options) -> Self {
        self.push(link_with(middleware, options))
    }

    /// Add an already resolved link.
    #[must_use]
    pub fn link(self, link: Arc<dyn Link>) -> Self {
        self.push(Ok(link))
    }

    /// Set the terminal adapter with its default options.
    #[must_use]
    pub fn adapter<A>(self, adapter: A) -> Self
    where
        A: Adapter,
        A::Options: Default,
    {
        self.adapter_with_options(adapter, A::Options::default())
    }

    /// Set the terminal adapter with explicit options.
    #[must_use]
    pub fn adapter_with_options<A: Adapter>(mut self, adapter: A, options: A::Options) -> Self {
        match adapter_with(adapter, options) {
            Ok(link) => self.adapter = Some(link),
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    /// Use the hyper transport as the default adapter.
    #[must_use]
    pub fn hyper(mut self) -> Self {
        self.config = self.config.hyper_default();
        self
    }

    // ========================================================================
    // Middleware Helpers
    // ========================================================================

    /// Add request/response logging.
    #[must_use]
    pub fn with_logging(self) -> Self {
        self.with(Logger)
    }

    /// Add debug-level logging (includes headers).
    #[must_use]
    pub fn with_debug_logging(self) -> Self {
        self.with_options(Logger, LogLevel::Debug)
    }

    /// Add headers to every request.
    #[must_use]
    pub fn with_headers(self, headers: Headers) -> Self {
        self.with_options(SetHeaders, headers)
    }

    /// Add bearer token authentication.
    #[must_use]
    pub fn with_bearer_auth(self, token: impl Into<String>) -> Self {
        self.with_options(BearerAuth, token.into())
    }

    /// Add basic authentication.
    #[must_use]
    pub fn with_basic_auth(self, username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        self.with_options(BasicAuth, BasicCredentials::new(username, password))
    }

    /// Add JSON request encoding and response decoding.
    #[must_use]
    pub fn with_json(self) -> Self {
        self.with(Json)
    }

    /// Add path template substitution.
    #[must_use]
    pub fn with_path_params(self) -> Self {
        self.with(PathParams)
    }

    /// Add a deadline around the rest of the chain.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_options(Timeout, timeout)
    }

    /// Add automatic response decompression.
    #[cfg(feature = "middleware-decompression")]
    #[must_use]
    pub fn with_decompression(self) -> Self {
        self.with(Decompression)
    }

    /// Add a circuit breaker.
    #[must_use]
    pub fn with_circuit_breaker(self, config: CircuitBreakerConfig) -> Self {
        self.with_options(CircuitBreaker::new(), config)
    }

    /// Limit outgoing exchanges to `per_second`.
    ///
    /// A zero rate surfaces from [`build`](Self::build).
    #[cfg(feature = "middleware-rate-limit")]
    #[must_use]
    pub fn with_rate_limit(self, per_second: u32) -> Self {
        self.push(RateLimit::per_second(per_second).and_then(tessel_core::link))
    }

    /// Add metrics recording.
    #[cfg(feature = "middleware-metrics")]
    #[must_use]
    pub fn with_metrics(self) -> Self {
        self.with(Metrics)
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a link or the adapter rejected its
    /// options, or if no adapter is available.
    pub fn build(self) -> Result<Client> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let config = self.config.build();
        Client::new(self.links, self.adapter, &config)
    }
}
