//! Client-side rate limiting with a token bucket from `governor`.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tessel_core::{Context, Error, LinkFuture, Middleware, Next, Result};
use tracing::debug;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Delays exchanges so the rest of the chain sees at most the quota.
///
/// Waiting happens before the continuation runs, and the continuation runs
/// exactly once. Clones share the same bucket, so one limiter registered on
/// several clients throttles them together.
///
/// # Example
///
/// ```ignore
/// use tessel::middleware::RateLimit;
///
/// let client = Client::builder()
///     .with(RateLimit::per_second(10)?)
///     .hyper()
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct RateLimit {
    limiter: Arc<DirectLimiter>,
}

impl RateLimit {
    /// Limit from a `governor` quota.
    #[must_use]
    pub fn new(quota: Quota) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Allow `count` exchanges per second.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when `count` is zero.
    pub fn per_second(count: u32) -> Result<Self> {
        Ok(Self::new(Quota::per_second(non_zero(count)?)))
    }

    /// Allow `count` exchanges per minute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when `count` is zero.
    pub fn per_minute(count: u32) -> Result<Self> {
        Ok(Self::new(Quota::per_minute(non_zero(count)?)))
    }
}

fn non_zero(count: u32) -> Result<NonZeroU32> {
    NonZeroU32::new(count).ok_or_else(|| Error::configuration("rate must be greater than zero"))
}

impl Middleware for RateLimit {
    type Options = ();

    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn call<'a>(&'a self, ctx: Context, next: Next<'a>, _options: &'a ()) -> LinkFuture<'a> {
        Box::pin(async move {
            if self.limiter.check().is_err() {
                debug!(ctx = %ctx.id(), "rate limited, waiting");
                self.limiter.until_ready().await;
            }
            next.run(ctx).await
        })
    }
}
