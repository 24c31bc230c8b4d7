//! Core types for the tessel HTTP middleware client.
//!
//! This crate provides the pipeline core used by `tessel`:
//! - [`Context`] - the mutable per-exchange record threaded through the pipeline
//! - [`Method`] and [`Body`] - request/response building blocks
//! - [`Middleware`] and [`Adapter`] - the two capabilities a chain is made of
//! - [`Link`] and [`AdapterLink`] - their type-erased, options-bound forms
//! - [`Chain`] and [`Next`] - the pipeline runner and its continuation
//! - [`Error`], [`ErrorKind`] and [`Result`] - error handling
//! - [`PathTemplate`] - original path template for middleware access

mod body;
mod chain;
mod context;
mod error;
mod link;
mod method;
mod path_template;
pub mod prelude;

pub use body::Body;
pub use chain::{Chain, Next};
pub use context::{Context, ContextId, Headers, Query};
pub use error::{Error, ErrorKind, Result, TransportError};
pub use link::{
    Adapter, AdapterLink, Bound, BoundAdapter, BoxFuture, Link, LinkFuture, Middleware, adapter,
    adapter_with, link, link_with,
};
pub use method::Method;
pub use path_template::PathTemplate;

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};
