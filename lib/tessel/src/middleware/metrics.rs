//! Metrics middleware using the metrics crate facade.
//!
//! Records exchange metrics through the `metrics` crate, which can be wired
//! to any backend (Prometheus, `StatsD`, etc.).

use tessel_core::{Context, LinkFuture, Middleware, Next, PathTemplate};
use tokio::time::Instant;

/// Labels used for metrics.
const LABEL_METHOD: &str = "method";
const LABEL_STATUS: &str = "status";
const LABEL_ROUTE: &str = "route";

/// Metric names.
const METRIC_REQUESTS_TOTAL: &str = "http_client_requests_total";
const METRIC_REQUEST_DURATION: &str = "http_client_request_duration_seconds";
const METRIC_REQUESTS_IN_FLIGHT: &str = "http_client_requests_in_flight";

/// Records HTTP client metrics.
///
/// - `http_client_requests_total` (counter): labeled by method, route and status
///   (`error` for failed exchanges, `cancelled` when the exchange was dropped)
/// - `http_client_request_duration_seconds` (histogram): labeled by method
/// - `http_client_requests_in_flight` (gauge)
///
/// The route is the unresolved [`PathTemplate`] when a
/// [`PathParams`](super::PathParams) link ran before this one, otherwise the
/// request URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metrics;

impl Middleware for Metrics {
    type Options = ();

    fn name(&self) -> &'static str {
        "metrics"
    }

    fn call<'a>(&'a self, ctx: Context, next: Next<'a>, _options: &'a ()) -> LinkFuture<'a> {
        let route = ctx
            .extensions()
            .get::<PathTemplate>()
            .map_or_else(|| ctx.url().to_string(), ToString::to_string);
        let in_flight = InFlight::start(ctx.method().to_string(), route);

        Box::pin(async move {
            let result = next.run(ctx).await;

            let status = match &result {
                Ok(ctx) => ctx
                    .status()
                    .map_or_else(|| "none".to_string(), |s| s.to_string()),
                Err(_) => "error".to_string(),
            };
            in_flight.finish(status);

            result
        })
    }
}

/// One exchange counted in the in-flight gauge.
///
/// Dropping it before [`finish`](Self::finish) records the exchange as
/// `cancelled`, so an outer timeout or a dropped caller future still
/// releases the gauge.
struct InFlight {
    method: String,
    route: String,
    start: Instant,
    finished: bool,
}

impl InFlight {
    fn start(method: String, route: String) -> Self {
        metrics::gauge!(METRIC_REQUESTS_IN_FLIGHT).increment(1.0);
        Self {
            method,
            route,
            start: Instant::now(),
            finished: false,
        }
    }

    fn finish(mut self, status: String) {
        self.record(status);
        self.finished = true;
    }

    fn record(&self, status: String) {
        let duration = self.start.elapsed().as_secs_f64();
        metrics::histogram!(METRIC_REQUEST_DURATION, LABEL_METHOD => self.method.clone())
            .record(duration);

        metrics::counter!(
            METRIC_REQUESTS_TOTAL,
            LABEL_METHOD => self.method.clone(),
            LABEL_ROUTE => self.route.clone(),
            LABEL_STATUS => status
        )
        .increment(1);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        metrics::gauge!(METRIC_REQUESTS_IN_FLIGHT).decrement(1.0);
        if !self.finished {
            self.record("cancelled".to_string());
        }
    }
}
