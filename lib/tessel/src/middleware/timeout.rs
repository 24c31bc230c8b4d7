//! Deadline middleware.

use std::time::Duration;

use tessel_core::{Context, Error, LinkFuture, Middleware, Next, Result};
use tracing::warn;

/// Fails the exchange with a timeout if the rest of the chain takes longer
/// than the bound duration.
///
/// The downstream future is dropped when the deadline passes, which
/// cancels an in-flight adapter call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timeout;

impl Middleware for Timeout {
    type Options = Duration;

    fn name(&self) -> &'static str {
        "timeout"
    }

    fn validate(&self, duration: &Duration) -> Result<()> {
        if duration.is_zero() {
            return Err(Error::configuration("duration must be greater than zero"));
        }
        Ok(())
    }

    fn call<'a>(&'a self, ctx: Context, next: Next<'a>, duration: &'a Duration) -> LinkFuture<'a> {
        let id = ctx.id();
        Box::pin(async move {
            if let Ok(result) = tokio::time::timeout(*duration, next.run(ctx)).await {
                result
            } else {
                warn!(ctx = %id, timeout_ms = duration.as_millis(), "deadline exceeded");
                Err(Error::timeout())
            }
        })
    }
}
