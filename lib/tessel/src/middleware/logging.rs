//! Request/response logging middleware.
//!
//! This middleware logs HTTP exchanges using the `tracing` crate.

use tessel_core::{Context, LinkFuture, Middleware, Next};
use tokio::time::Instant;
use tracing::{Instrument, Level, debug, info, span, warn};

/// Log level for the logging middleware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Log at debug level (request/response details).
    Debug,
    /// Log at info level (summary only).
    #[default]
    Info,
}

/// Logs requests and responses.
///
/// # Example
///
/// ```ignore
/// use tessel::middleware::{LogLevel, Logger};
///
/// let client = Client::builder()
///     .with_options(Logger, LogLevel::Debug)
///     .hyper()
///     .build()?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

impl Middleware for Logger {
    type Options = LogLevel;

    fn name(&self) -> &'static str {
        "logger"
    }

    fn call<'a>(&'a self, ctx: Context, next: Next<'a>, level: &'a LogLevel) -> LinkFuture<'a> {
        let method = ctx.method();
        let url = ctx.url().to_string();
        let id = ctx.id();

        let span = span!(Level::INFO, "http_request", %method, %url, ctx = %id);

        Box::pin(
            async move {
                let start = Instant::now();

                match level {
                    LogLevel::Debug => {
                        debug!(
                            method = %method,
                            url = %url,
                            headers = ?ctx.headers(),
                            query = ?ctx.query(),
                            "sending request"
                        );
                    }
                    LogLevel::Info => {
                        info!(method = %method, url = %url, "sending request");
                    }
                }

                let result = next.run(ctx).await;

                // Saturating conversion to u64 (truncates after ~584 million years)
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(ctx) => match ctx.status() {
                        Some(status) if ctx.is_success() => {
                            if *level == LogLevel::Debug {
                                debug!(
                                    status,
                                    elapsed_ms,
                                    headers = ?ctx.response_headers(),
                                    "request completed"
                                );
                            } else {
                                info!(status, elapsed_ms, "request completed");
                            }
                        }
                        Some(status) => {
                            warn!(status, elapsed_ms, "request failed with HTTP error");
                        }
                        None => {
                            warn!(elapsed_ms, "request completed without a response");
                        }
                    },
                    Err(err) => {
                        warn!(error = %err, kind = %err.kind(), elapsed_ms, "request failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
