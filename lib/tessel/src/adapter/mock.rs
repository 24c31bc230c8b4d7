//! Closure-driven adapter for tests.

use std::fmt;

use tessel_core::{Adapter, Body, Context, Headers, LinkFuture, Result};

/// Canned response produced by a [`MockAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    status: u16,
    headers: Headers,
    body: Body,
}

impl MockResponse {
    /// Create a response with the given status and no body.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    /// Add a response header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the response body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a raw JSON body with a matching content type.
    #[must_use]
    pub fn json(self, value: &serde_json::Value) -> Self {
        self.header("content-type", "application/json")
            .body(value.to_string())
    }
}

/// Adapter that answers every exchange by calling a closure.
///
/// # Example
///
/// ```ignore
/// use tessel::adapter::{MockAdapter, MockResponse};
///
/// let mock = MockAdapter::new(|ctx| match ctx.url() {
///     "/users/1" => Ok(MockResponse::new(200).body("alice")),
///     _ => Ok(MockResponse::new(404)),
/// });
/// ```
pub struct MockAdapter<F> {
    handler: F,
}

impl<F> MockAdapter<F>
where
    F: Fn(&Context) -> Result<MockResponse> + Send + Sync + 'static,
{
    /// Create a mock adapter from a handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl MockAdapter<fn(&Context) -> Result<MockResponse>> {
    /// A mock that always answers `200 OK` with an empty body.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            handler: |_| Ok(MockResponse::new(200)),
        }
    }
}

impl<F> fmt::Debug for MockAdapter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockAdapter").finish_non_exhaustive()
    }
}

impl<F> Adapter for MockAdapter<F>
where
    F: Fn(&Context) -> Result<MockResponse> + Send + Sync + 'static,
{
    type Options = ();

    fn name(&self) -> &'static str {
        "mock"
    }

    fn call<'a>(&'a self, mut ctx: Context, _options: &'a ()) -> LinkFuture<'a> {
        let result = (self.handler)(&ctx).map(|response| {
            ctx.set_response(response.status, response.headers, response.body);
            ctx
        });
        Box::pin(std::future::ready(result))
    }
}
