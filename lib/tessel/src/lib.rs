//! HTTP client built from composable middleware around a pluggable adapter.
//!
//! A [`Client`] binds an ordered list of middleware and one terminal adapter
//! once, at construction. Every call builds a fresh [`Context`], runs it down
//! through the middleware to the adapter, and back up in reverse order.
//!
//! # Example
//!
//! ```ignore
//! use tessel::prelude::*;
//! use tessel::middleware::{Json, Logger, PathParams};
//!
//! #[derive(Debug, Deserialize)]
//! pub struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! let client = Client::builder()
//!     .base_url("https://api.example.com")
//!     .with(Logger)
//!     .with(PathParams)
//!     .with(Json)
//!     .hyper()
//!     .build()?;
//!
//! let ctx = client
//!     .get("/users/{id}", RequestOptions::new().path_param("id", 42))
//!     .await?;
//! let user: User = ctx.response_json()?;
//! ```
//!
//! # Writing middleware
//!
//! A middleware implements [`Middleware`]: it receives the context, the
//! continuation and its bound options, and either runs the continuation or
//! answers on its own.
//!
//! ```ignore
//! use tessel::prelude::*;
//!
//! struct ShortCircuitIfCached;
//!
//! impl Middleware for ShortCircuitIfCached {
//!     type Options = ();
//!
//!     fn name(&self) -> &'static str {
//!         "cache"
//!     }
//!
//!     fn call<'a>(&'a self, mut ctx: Context, next: Next<'a>, _: &'a ()) -> LinkFuture<'a> {
//!         Box::pin(async move {
//!             if ctx.get("cached").is_some() {
//!                 ctx.set_response(200, Vec::new(), "from cache");
//!                 return Ok(ctx);
//!             }
//!             next.run(ctx).await
//!         })
//!     }
//! }
//! ```

pub mod adapter;
mod client;
mod config;
mod connector;
pub mod middleware;
pub mod prelude;

pub use client::{Client, ClientBuilder, RequestOptions, ServiceFuture};
pub use config::{ClientConfig, ClientConfigBuilder, DefaultAdapter};

// Re-export tower for service composition
pub use tower;

// Re-export core types
pub use tessel_core::{
    Adapter, AdapterLink, Body, Bound, BoundAdapter, BoxFuture, Chain, Context, ContextId, Error,
    ErrorKind, Headers, Link, LinkFuture, Method, Middleware, Next, PathTemplate, Query, Result,
    TransportError, adapter_with, link, link_with,
};

// Re-export http types for status codes and headers
pub use tessel_core::{StatusCode, header};
