//! Circuit breaker middleware for fault tolerance.
//!
//! Stops calling a failing downstream for a while: once enough consecutive
//! exchanges fail, the breaker opens and short-circuits every request with a
//! middleware error until the open period has elapsed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tessel_core::{Context, Error, LinkFuture, Middleware, Next, Result};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally.
    Closed,
    /// Circuit is open, requests are rejected immediately.
    Open,
    /// Circuit is half-open, test requests are let through.
    HalfOpen,
}

/// Options for the [`CircuitBreaker`] middleware.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Duration the circuit stays open before transitioning to half-open.
    pub open_duration: Duration,
    /// Number of successful requests needed to close the circuit from half-open.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    /// Set the failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the open duration.
    #[must_use]
    pub const fn with_open_duration(mut self, duration: Duration) -> Self {
        self.open_duration = duration;
        self
    }

    /// Set the success threshold.
    #[must_use]
    pub const fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }
}

#[derive(Debug)]
struct BreakerState {
    /// Current state (0 = Closed, 1 = Open, 2 = `HalfOpen`).
    state: AtomicU32,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    /// Millis since `epoch` when the circuit last opened.
    opened_at: AtomicU64,
    epoch: Instant,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            opened_at: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    fn get_state(&self) -> CircuitState {
        match self.state.load(Ordering::SeqCst) {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    fn elapsed_millis(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn open(&self) {
        self.state.store(1, Ordering::SeqCst);
        self.opened_at.store(self.elapsed_millis(), Ordering::SeqCst);
    }

    fn should_allow_request(&self, config: &CircuitBreakerConfig) -> bool {
        match self.get_state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let opened_at = self.opened_at.load(Ordering::SeqCst);
                let elapsed =
                    Duration::from_millis(self.elapsed_millis().saturating_sub(opened_at));

                if elapsed >= config.open_duration {
                    self.state.store(2, Ordering::SeqCst);
                    self.success_count.store(0, Ordering::SeqCst);
                    debug!("circuit half-open");
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self, config: &CircuitBreakerConfig) {
        match self.get_state() {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                let count = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= config.success_threshold {
                    self.state.store(0, Ordering::SeqCst);
                    self.failure_count.store(0, Ordering::SeqCst);
                    debug!("circuit closed");
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self, config: &CircuitBreakerConfig) {
        match self.get_state() {
            CircuitState::Closed => {
                let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= config.failure_threshold {
                    self.open();
                    warn!(failures = count, "circuit opened");
                }
            }
            // Any failure in half-open returns to open
            CircuitState::HalfOpen => {
                self.open();
                warn!("circuit re-opened");
            }
            CircuitState::Open => {}
        }
    }
}

/// Circuit breaker around the rest of the chain.
///
/// Transport errors and 5xx responses count as failures. Other errors, such
/// as a middleware rejecting the request, leave the breaker untouched. While
/// open, exchanges fail
/// with a middleware error on the `circuit_breaker` link and the adapter is
/// not called.
///
/// The breaker state is shared by clones, so a handle kept before
/// registration can observe it.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use tessel::middleware::{CircuitBreaker, CircuitBreakerConfig};
///
/// let config = CircuitBreakerConfig::default()
///     .with_failure_threshold(3)
///     .with_open_duration(Duration::from_secs(60));
///
/// let client = Client::builder()
///     .with_options(CircuitBreaker::new(), config)
///     .hyper()
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: Arc<BreakerState>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    /// Create a closed circuit breaker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(BreakerState::new()),
        }
    }

    /// Get the current circuit state.
    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.state.get_state()
    }
}

impl Middleware for CircuitBreaker {
    type Options = CircuitBreakerConfig;

    fn name(&self) -> &'static str {
        "circuit_breaker"
    }

    fn validate(&self, config: &CircuitBreakerConfig) -> Result<()> {
        if config.failure_threshold == 0 || config.success_threshold == 0 {
            return Err(Error::configuration("thresholds must be greater than zero"));
        }
        Ok(())
    }

    fn call<'a>(
        &'a self,
        ctx: Context,
        next: Next<'a>,
        config: &'a CircuitBreakerConfig,
    ) -> LinkFuture<'a> {
        if !self.state.should_allow_request(config) {
            warn!(ctx = %ctx.id(), "circuit open, request rejected");
            let err = Error::middleware("circuit_breaker", "circuit is open");
            return Box::pin(std::future::ready(Err(err)));
        }

        Box::pin(async move {
            let result = next.run(ctx).await;

            match &result {
                Ok(ctx) if ctx.is_server_error() => self.state.record_failure(config),
                Ok(_) => self.state.record_success(config),
                Err(err) if err.is_transport() => self.state.record_failure(config),
                // Raised before any I/O, says nothing about the downstream
                Err(_) => {}
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use tessel_core::{Chain, Method, adapter, link_with};

    use super::*;
    use crate::adapter::{MockAdapter, MockResponse};

    fn chain_with(
        breaker: &CircuitBreaker,
        config: CircuitBreakerConfig,
        calls: Arc<AtomicU32>,
        fail_first: u32,
    ) -> Chain {
        let mock = MockAdapter::new(move |_| {
            let count = calls.fetch_add(1, Ordering::SeqCst);
            if count < fail_first {
                Err(Error::connection("mock error"))
            } else {
                Ok(MockResponse::new(200))
            }
        });
        Chain::new(
            vec![link_with(breaker.clone(), config).expect("breaker")],
            adapter(mock).expect("mock"),
        )
    }

    async fn send(chain: &Chain) -> Result<Context> {
        chain.run(Context::new(Method::Get, "/")).await
    }

    #[test]
    fn config_builder() {
        let config = CircuitBreakerConfig::default()
            .with_failure_threshold(10)
            .with_open_duration(Duration::from_secs(60))
            .with_success_threshold(3);

        check!(config.failure_threshold == 10);
        check!(config.open_duration == Duration::from_secs(60));
        check!(config.success_threshold == 3);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let config = CircuitBreakerConfig::default().with_failure_threshold(0);
        let_assert!(Err(err) = link_with(CircuitBreaker::new(), config));
        check!(err.is_configuration());
    }

    #[tokio::test]
    async fn opens_after_failures_and_short_circuits() {
        let breaker = CircuitBreaker::new();
        let calls = Arc::new(AtomicU32::new(0));
        let config = CircuitBreakerConfig::default().with_failure_threshold(3);
        let chain = chain_with(&breaker, config, Arc::clone(&calls), u32::MAX);

        for _ in 0..3 {
            let_assert!(Err(err) = send(&chain).await);
            check!(err.is_connection());
        }
        check!(breaker.circuit_state() == CircuitState::Open);

        let_assert!(Err(err) = send(&chain).await);
        check!(err.link() == Some("circuit_breaker"));
        check!(calls.load(Ordering::SeqCst) == 3);
    }

    #[tokio::test]
    async fn server_errors_count_as_failures() {
        let breaker = CircuitBreaker::new();
        let config = CircuitBreakerConfig::default().with_failure_threshold(2);
        let chain = Chain::new(
            vec![link_with(breaker.clone(), config).expect("breaker")],
            adapter(MockAdapter::new(|_| Ok(MockResponse::new(503)))).expect("mock"),
        );

        for _ in 0..2 {
            let ctx = send(&chain).await.expect("response");
            check!(ctx.status() == Some(503));
        }
        check!(breaker.circuit_state() == CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_success_closes() {
        let breaker = CircuitBreaker::new();
        let calls = Arc::new(AtomicU32::new(0));
        let config = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_open_duration(Duration::from_secs(10))
            .with_success_threshold(1);
        let chain = chain_with(&breaker, config, calls, 1);

        let _ = send(&chain).await;
        check!(breaker.circuit_state() == CircuitState::Open);

        tokio::time::advance(Duration::from_secs(11)).await;

        let ctx = send(&chain).await.expect("half-open request");
        check!(ctx.status() == Some(200));
        check!(breaker.circuit_state() == CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new();
        let calls = Arc::new(AtomicU32::new(0));
        let config = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_open_duration(Duration::from_secs(10));
        let chain = chain_with(&breaker, config, Arc::clone(&calls), u32::MAX);

        let _ = send(&chain).await;
        tokio::time::advance(Duration::from_secs(11)).await;

        let_assert!(Err(err) = send(&chain).await);
        check!(err.is_connection());
        check!(breaker.circuit_state() == CircuitState::Open);
        check!(calls.load(Ordering::SeqCst) == 2);
    }

    #[tokio::test]
    async fn non_transport_errors_do_not_trip() {
        let breaker = CircuitBreaker::new();
        let config = CircuitBreakerConfig::default().with_failure_threshold(1);
        let chain = Chain::new(
            vec![link_with(breaker.clone(), config).expect("breaker")],
            adapter(MockAdapter::new(|_| {
                Err(Error::middleware("path_params", "missing value"))
            }))
            .expect("mock"),
        );

        for _ in 0..3 {
            let_assert!(Err(err) = send(&chain).await);
            check!(err.link() == Some("path_params"));
        }
        check!(breaker.circuit_state() == CircuitState::Closed);
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new();
        let config = CircuitBreakerConfig::default().with_failure_threshold(3);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mock = MockAdapter::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst).is_multiple_of(2) {
                Err(Error::connection("mock error"))
            } else {
                Ok(MockResponse::new(200))
            }
        });
        let chain = Chain::new(
            vec![link_with(breaker.clone(), config).expect("breaker")],
            adapter(mock).expect("mock"),
        );

        for _ in 0..10 {
            let _ = send(&chain).await;
            check!(breaker.circuit_state() == CircuitState::Closed);
        }
    }
}
