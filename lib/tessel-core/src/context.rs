//! The per-exchange context threaded through the pipeline.
//!
//! A [`Context`] is created by the client for one logical request, moved
//! through every link down to the adapter, filled with the response, and
//! moved back up. It is never shared between concurrent requests.
//!
//! # Example
//!
//! ```
//! use tessel_core::{Context, Method};
//!
//! let mut ctx = Context::new(Method::Get, "https://api.example.com/users");
//! ctx.put_header("Accept", "application/json");
//! ctx.append_query("page", "1");
//!
//! assert_eq!(ctx.header("accept"), Some("application/json"));
//! assert_eq!(ctx.query_values("page"), ["1"]);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use derive_more::Display;
use http::Extensions;
use serde_json::Value;

use crate::{Body, Method};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("ctx-{_0}")]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value of this identity.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Ordered header list with case-insensitive lookup.
pub type Headers = Vec<(String, String)>;

/// Query parameters: each key maps to one or many values.
pub type Query = BTreeMap<String, Vec<String>>;

/// Mutable record for one request/response exchange.
#[derive(Debug, Clone)]
pub struct Context {
    id: ContextId,
    method: Method,
    url: String,
    headers: Headers,
    query: Query,
    body: Body,
    status: Option<u16>,
    response_headers: Headers,
    response_body: Body,
    scratch: HashMap<String, Value>,
    extensions: Extensions,
}

impl Context {
    /// Creates a fresh context for `method` on `url`.
    ///
    /// `url` may be absolute or a path (template) that a link resolves later.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            id: ContextId::next(),
            method,
            url: url.into(),
            headers: Vec::new(),
            query: BTreeMap::new(),
            body: Body::Empty,
            status: None,
            response_headers: Vec::new(),
            response_body: Body::Empty,
            scratch: HashMap::new(),
            extensions: Extensions::new(),
        }
    }

    /// Identity of this exchange.
    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }

    // ------------------------------------------------------------------
    // Request side
    // ------------------------------------------------------------------

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Replace the HTTP method.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Target URL or path template.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Replace the target URL.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Request headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable access to request headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// First request header value matching `name`, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Append a request header, keeping existing values with the same name.
    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Set a request header, replacing every existing value with the same name.
    pub fn put_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove_header(&name);
        self.headers.push((name, value.into()));
    }

    /// Remove every request header named `name`.
    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Query parameters.
    #[must_use]
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Mutable access to query parameters.
    pub fn query_mut(&mut self) -> &mut Query {
        &mut self.query
    }

    /// Append a value to the query key `name`.
    pub fn append_query(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.query.entry(name.into()).or_default().push(value.into());
    }

    /// Values of the query key `name`.
    #[must_use]
    pub fn query_values(&self, name: &str) -> &[String] {
        self.query.get(name).map_or(&[], Vec::as_slice)
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Replace the request body.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Take the request body, leaving [`Body::Empty`].
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    // ------------------------------------------------------------------
    // Response side
    // ------------------------------------------------------------------

    /// Response status, once an adapter (or a short-circuiting link) set one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    /// Set the response status.
    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    /// Returns `true` once a response status is present.
    #[must_use]
    pub const fn has_response(&self) -> bool {
        self.status.is_some()
    }

    /// Status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_some_and(|s| (200..300).contains(&s))
    }

    /// Status is 4xx.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status.is_some_and(|s| (400..500).contains(&s))
    }

    /// Status is 5xx.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status.is_some_and(|s| (500..600).contains(&s))
    }

    /// Response headers.
    #[must_use]
    pub fn response_headers(&self) -> &Headers {
        &self.response_headers
    }

    /// Mutable access to response headers.
    pub fn response_headers_mut(&mut self) -> &mut Headers {
        &mut self.response_headers
    }

    /// First response header value matching `name`, case-insensitively.
    #[must_use]
    pub fn response_header(&self, name: &str) -> Option<&str> {
        find_header(&self.response_headers, name)
    }

    /// Response body.
    #[must_use]
    pub const fn response_body(&self) -> &Body {
        &self.response_body
    }

    /// Replace the response body.
    pub fn set_response_body(&mut self, body: impl Into<Body>) {
        self.response_body = body.into();
    }

    /// Take the response body, leaving [`Body::Empty`].
    pub fn take_response_body(&mut self) -> Body {
        std::mem::take(&mut self.response_body)
    }

    /// Fill in a complete response.
    pub fn set_response(&mut self, status: u16, headers: Headers, body: impl Into<Body>) {
        self.status = Some(status);
        self.response_headers = headers;
        self.response_body = body.into();
    }

    /// Deserialize the response body as JSON.
    ///
    /// Works on both raw and already-decoded bodies.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn response_json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        match &self.response_body {
            Body::Json(value) => Ok(T::deserialize(value)?),
            Body::Empty => Ok(serde_json::from_slice(b"null")?),
            Body::Bytes(bytes) => Ok(serde_json::from_slice(bytes)?),
            Body::Text(text) => Ok(serde_json::from_str(text)?),
        }
    }

    // ------------------------------------------------------------------
    // Scratch space
    // ------------------------------------------------------------------

    /// Value stored under `key` by a previous link or the caller.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.scratch.get(key)
    }

    /// Store a value for downstream (or upstream) links.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.scratch.insert(key.into(), value.into());
    }

    /// Remove and return the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.scratch.remove(key)
    }

    /// The whole scratch map.
    #[must_use]
    pub fn scratch(&self) -> &HashMap<String, Value> {
        &self.scratch
    }

    /// Mutable access to the scratch map.
    pub fn scratch_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.scratch
    }

    /// Typed extensions, for values that are not JSON (timers, span handles).
    #[must_use]
    pub const fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable access to typed extensions.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
