//! Concrete middleware for the tessel client.
//!
//! Every type here implements [`Middleware`](tessel_core::Middleware) and is
//! registered on a [`ClientBuilder`](crate::ClientBuilder), either bare
//! (`.with(Json)`) or paired with its options (`.with_options(BearerAuth, token)`).
//! Links run in registration order on the way down and in reverse order on
//! the way back up.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `middleware-decompression` | [`Decompression`] (gzip, deflate, br, zstd) |
//! | `middleware-metrics` | [`Metrics`] via the `metrics` facade |
//! | `middleware-rate-limit` | [`RateLimit`] token bucket via `governor` |
//! | `middleware-full` | All optional middleware |
//!
//! # Available Middleware
//!
//! - [`SetHeaders`] - sets request headers
//! - [`QueryParams`] - appends query values
//! - [`PathParams`] - fills `{name}` and `:name` path placeholders
//! - [`BearerAuth`] - adds `Authorization: Bearer <token>`
//! - [`BasicAuth`] - adds `Authorization: Basic <base64>`
//! - [`Json`] - encodes JSON request bodies and decodes JSON responses
//! - [`Logger`] - logs requests/responses using `tracing`
//! - [`Timeout`] - deadline around the rest of the chain
//! - [`CircuitBreaker`] - stops calling a failing downstream
//! - `RateLimit` - waits for a token before the rest of the chain runs
//!
//! Retries and redirect following are absent on purpose: both would run
//! the continuation more than once.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tessel::Client;
//! use tessel::middleware::{BearerAuth, Json, Logger, Timeout};
//!
//! let client = Client::builder()
//!     .base_url("https://api.example.com")
//!     .with(Logger)
//!     .with_options(Timeout, Duration::from_secs(5))
//!     .with_options(BearerAuth, "my-token".to_string())
//!     .with(Json)
//!     .hyper()
//!     .build()?;
//! ```

mod basic_auth;
mod bearer_auth;
mod circuit_breaker;
#[cfg(feature = "middleware-decompression")]
mod decompression;
mod headers;
mod json;
mod logging;
#[cfg(feature = "middleware-metrics")]
mod metrics;
mod path_params;
#[cfg(feature = "middleware-rate-limit")]
mod rate_limit;
mod timeout;

pub use basic_auth::{BasicAuth, BasicCredentials};
pub use bearer_auth::BearerAuth;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
#[cfg(feature = "middleware-decompression")]
pub use decompression::Decompression;
pub use headers::{QueryParams, SetHeaders};
pub use json::{Json, JsonOptions, from_json};
pub use logging::{LogLevel, Logger};
#[cfg(feature = "middleware-metrics")]
pub use metrics::Metrics;
pub use path_params::{PATH_PARAMS_KEY, PathParams};
#[cfg(feature = "middleware-rate-limit")]
pub use rate_limit::RateLimit;
pub use timeout::Timeout;
