//! Terminal adapters.
//!
//! An adapter performs the actual exchange at the end of a chain:
//!
//! - [`HyperAdapter`] - HTTP/1.1 + HTTP/2 over rustls, with connection pooling
//! - [`EchoAdapter`] - answers 200 with the request headers and body
//! - [`MockAdapter`] - answers from a closure, for tests
//! - [`ServiceAdapter`] - any `tower::Service<Context>` used as a terminal link

mod echo;
mod hyper;
mod mock;
mod service;

pub use echo::EchoAdapter;
pub use hyper::{HyperAdapter, HyperOptions};
pub use mock::{MockAdapter, MockResponse};
pub use service::ServiceAdapter;
