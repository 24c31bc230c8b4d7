//! Pipeline behaviour through the public client API.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert2::{check, let_assert};
use serde_json::json;
use tessel::adapter::{EchoAdapter, MockAdapter, MockResponse, ServiceAdapter};
use tessel::middleware::{
    BasicAuth, BasicCredentials, BearerAuth, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    Json, LogLevel, Logger, QueryParams, SetHeaders,
};
use tessel::{
    Adapter, Body, Client, ClientConfig, Context, Error, ErrorKind, LinkFuture, Method, Middleware,
    Next, RequestOptions,
};

// ============================================================================
// Test middleware
// ============================================================================

struct AddHeader;

impl Middleware for AddHeader {
    type Options = (String, String);

    fn name(&self) -> &'static str {
        "add_header"
    }

    fn call<'a>(
        &'a self,
        mut ctx: Context,
        next: Next<'a>,
        (name, value): &'a (String, String),
    ) -> LinkFuture<'a> {
        ctx.put_header(name.clone(), value.clone());
        Box::pin(async move { next.run(ctx).await })
    }
}

struct ShortCircuitIfCached;

impl Middleware for ShortCircuitIfCached {
    type Options = ();

    fn name(&self) -> &'static str {
        "cache"
    }

    fn call<'a>(&'a self, mut ctx: Context, next: Next<'a>, _options: &'a ()) -> LinkFuture<'a> {
        Box::pin(async move {
            if ctx.get("cached") == Some(&json!(true)) {
                ctx.set_response(200, vec![("x-cache".into(), "hit".into())], "cached");
                return Ok(ctx);
            }
            next.run(ctx).await
        })
    }
}

/// Appends its label to a shared journal on the way down and up.
struct Journal(Arc<Mutex<Vec<String>>>);

impl Middleware for Journal {
    type Options = &'static str;

    fn name(&self) -> &'static str {
        "journal"
    }

    fn call<'a>(&'a self, ctx: Context, next: Next<'a>, label: &'a &'static str) -> LinkFuture<'a> {
        Box::pin(async move {
            self.push(format!("{label}:down"));
            let result = next.run(ctx).await;
            self.push(format!("{label}:up"));
            result
        })
    }
}

impl Journal {
    fn push(&self, entry: String) {
        if let Ok(mut entries) = self.0.lock() {
            entries.push(entry);
        }
    }
}

/// Turns transport errors into a synthetic 503 response.
struct Fallback;

impl Middleware for Fallback {
    type Options = ();

    fn name(&self) -> &'static str {
        "fallback"
    }

    fn call<'a>(&'a self, ctx: Context, next: Next<'a>, _options: &'a ()) -> LinkFuture<'a> {
        let mut fallback = ctx.clone();
        Box::pin(async move {
            match next.run(ctx).await {
                Err(err) if err.is_transport() => {
                    fallback.set_response(503, Vec::new(), err.to_string());
                    Ok(fallback)
                }
                other => other,
            }
        })
    }
}

/// Runs its continuation twice.
struct Greedy;

impl Middleware for Greedy {
    type Options = ();

    fn name(&self) -> &'static str {
        "greedy"
    }

    fn call<'a>(&'a self, ctx: Context, next: Next<'a>, _options: &'a ()) -> LinkFuture<'a> {
        Box::pin(async move {
            let _first = next.run(ctx.clone()).await?;
            next.run(ctx).await
        })
    }
}

/// Echo adapter that counts its invocations.
#[derive(Clone, Default)]
struct CountingEcho(Arc<AtomicUsize>);

impl Adapter for CountingEcho {
    type Options = ();

    fn name(&self) -> &'static str {
        "counting_echo"
    }

    fn call<'a>(&'a self, mut ctx: Context, _options: &'a ()) -> LinkFuture<'a> {
        self.0.fetch_add(1, Ordering::SeqCst);
        let headers = ctx.headers().clone();
        let body = ctx.body().clone();
        ctx.set_response(200, headers, body);
        Box::pin(async move { Ok(ctx) })
    }
}

fn header(name: &str, value: &str) -> (String, String) {
    (name.to_string(), value.to_string())
}

// ============================================================================
// Pipeline properties
// ============================================================================

#[tokio::test]
async fn cache_miss_reaches_adapter_and_hit_short_circuits() {
    let echo = CountingEcho::default();
    let client = Client::builder()
        .with_options(AddHeader, header("x-test", "1"))
        .with(ShortCircuitIfCached)
        .adapter(echo.clone())
        .build()
        .expect("client");

    let miss = client
        .get("/item", RequestOptions::new().set("cached", false))
        .await
        .expect("miss");
    check!(miss.response_header("x-test") == Some("1"));
    check!(echo.0.load(Ordering::SeqCst) == 1);

    let hit = client
        .get("/item", RequestOptions::new().set("cached", true))
        .await
        .expect("hit");
    check!(hit.response_header("x-cache") == Some("hit"));
    check!(hit.response_header("x-test").is_none());
    check!(hit.response_body().as_text() == Some("cached"));
    check!(echo.0.load(Ordering::SeqCst) == 1);
}

#[tokio::test]
async fn adapter_runs_exactly_once_per_call() {
    let echo = CountingEcho::default();
    let client = Client::builder()
        .with(Logger)
        .with_options(SetHeaders, vec![header("a", "1")])
        .with_options(QueryParams, vec![header("q", "1")])
        .adapter(echo.clone())
        .build()
        .expect("client");

    for _ in 0..3 {
        client.get("/", RequestOptions::new()).await.expect("get");
    }
    check!(echo.0.load(Ordering::SeqCst) == 3);
}

#[tokio::test]
async fn links_nest_in_lifo_order() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let client = Client::builder()
        .with_options(Journal(Arc::clone(&journal)), "outer")
        .with_options(Journal(Arc::clone(&journal)), "inner")
        .adapter(EchoAdapter)
        .build()
        .expect("client");

    client.get("/", RequestOptions::new()).await.expect("get");

    let entries = journal.lock().expect("journal").clone();
    check!(entries == ["outer:down", "inner:down", "inner:up", "outer:up"]);
}

#[tokio::test]
async fn errors_unwind_through_every_link() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let client = Client::builder()
        .with_options(Journal(Arc::clone(&journal)), "outer")
        .with_options(Journal(Arc::clone(&journal)), "inner")
        .adapter(MockAdapter::new(|_| Err(Error::connection("refused"))))
        .build()
        .expect("client");

    let_assert!(Err(err) = client.get("/", RequestOptions::new()).await);
    check!(err.is_connection());
    let entries = journal.lock().expect("journal").clone();
    check!(entries == ["outer:down", "inner:down", "inner:up", "outer:up"]);
}

#[tokio::test]
async fn middleware_recovers_from_transport_error() {
    let client = Client::builder()
        .with(Fallback)
        .adapter(MockAdapter::new(|_| Err(Error::timeout())))
        .build()
        .expect("client");

    let ctx = client.get("/", RequestOptions::new()).await.expect("recovered");
    check!(ctx.status() == Some(503));
}

#[tokio::test]
async fn double_continuation_is_misuse() {
    let echo = CountingEcho::default();
    let client = Client::builder()
        .with(Greedy)
        .adapter(echo.clone())
        .build()
        .expect("client");

    let_assert!(Err(err) = client.get("/", RequestOptions::new()).await);
    check!(err.kind() == ErrorKind::Misuse);
    check!(echo.0.load(Ordering::SeqCst) == 1);
}

#[tokio::test]
async fn concurrent_calls_are_isolated() {
    let client = Client::builder()
        .base_url("http://svc.local")
        .with_options(AddHeader, header("x-shared", "yes"))
        .adapter(EchoAdapter)
        .build()
        .expect("client");

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let options = RequestOptions::new().header("x-call", i.to_string());
                let ctx = client
                    .post("/items", format!("body-{i}"), options)
                    .await
                    .expect("post");
                (i, ctx)
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        let (i, ctx) = handle.await.expect("join");
        let expected_header = i.to_string();
        let expected_body = format!("body-{i}");
        check!(ctx.response_header("x-call") == Some(expected_header.as_str()));
        check!(ctx.response_header("x-shared") == Some("yes"));
        check!(ctx.response_body().as_text() == Some(expected_body.as_str()));
        check!(ids.insert(ctx.id()));
    }
    check!(ids.len() == 32);
}

#[tokio::test]
async fn concurrent_gets_are_isolated() {
    let client = Client::builder()
        .base_url("http://svc.local")
        .with_path_params()
        .adapter(EchoAdapter)
        .build()
        .expect("client");

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let options = RequestOptions::new()
                    .path_param("id", i)
                    .header("x-call", i.to_string());
                let ctx = client.get("/items/{id}", options).await.expect("get");
                (i, ctx)
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        let (i, ctx) = handle.await.expect("join");
        let expected_url = format!("http://svc.local/items/{i}");
        let expected_header = i.to_string();
        check!(ctx.url() == expected_url);
        check!(ctx.response_header("x-call") == Some(expected_header.as_str()));
        check!(ids.insert(ctx.id()));
    }
    check!(ids.len() == 32);
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn missing_adapter_fails_without_network() {
    let_assert!(Err(err) = Client::builder().with(Logger).build());
    check!(err.kind() == ErrorKind::Configuration);
}

#[test]
fn rejected_options_fail_construction() {
    let_assert!(Err(err) = Client::builder().with(BearerAuth).adapter(EchoAdapter).build());
    check!(err.is_configuration());
    check!(err.to_string().contains("bearer_auth"));

    let zero = CircuitBreakerConfig::default().with_success_threshold(0);
    let_assert!(Err(err) = Client::builder().with_circuit_breaker(zero).adapter(EchoAdapter).build());
    check!(err.is_configuration());
}

#[tokio::test]
async fn default_adapter_comes_from_config() {
    let default = tessel_core::adapter(MockAdapter::new(|_| Ok(MockResponse::new(418))))
        .expect("mock");
    let config = ClientConfig::builder().default_adapter(default);
    let client = Client::builder().config(config).build().expect("client");

    let ctx = client.get("/", RequestOptions::new()).await.expect("get");
    check!(ctx.status() == Some(418));
}

#[tokio::test]
async fn explicit_adapter_wins_over_default() {
    let default = tessel_core::adapter(MockAdapter::ok()).expect("mock");
    let config = ClientConfig::builder().default_adapter(default);
    let client = Client::builder()
        .config(config)
        .adapter(EchoAdapter)
        .build()
        .expect("client");

    check!(client.chain().names() == ["echo"]);
}

// ============================================================================
// Middleware catalogue
// ============================================================================

#[tokio::test]
async fn auth_and_headers_compose() {
    let client = Client::builder()
        .with_basic_auth("user", "pass")
        .with_bearer_auth("token")
        .with_headers(vec![header("User-Agent", "tessel-test")])
        .with_debug_logging()
        .adapter(EchoAdapter)
        .build()
        .expect("client");

    let ctx = client.get("/", RequestOptions::new()).await.expect("get");

    // The inner link writes last
    check!(ctx.response_header("authorization") == Some("Bearer token"));
    check!(ctx.response_header("user-agent") == Some("tessel-test"));
}

#[tokio::test]
async fn basic_auth_alone() {
    let client = Client::builder()
        .with_options(BasicAuth, BasicCredentials::new("user", "pass"))
        .with_options(Logger, LogLevel::Info)
        .adapter(EchoAdapter)
        .build()
        .expect("client");

    let ctx = client.get("/", RequestOptions::new()).await.expect("get");
    check!(ctx.response_header("Authorization") == Some("Basic dXNlcjpwYXNz"));
}

#[tokio::test]
async fn json_round_trip_through_echo() {
    let client = Client::builder()
        .with(Json)
        .adapter(MockAdapter::new(|ctx| {
            let echoed = ctx.body().as_bytes().map(<[u8]>::to_vec).unwrap_or_default();
            Ok(MockResponse::new(200)
                .header("content-type", "application/json")
                .body(echoed))
        }))
        .build()
        .expect("client");

    let body = Body::json(&json!({"name": "Alice"})).expect("body");
    let ctx = client
        .post("/users", body, RequestOptions::new())
        .await
        .expect("post");

    check!(ctx.response_body().as_json() == Some(&json!({"name": "Alice"})));
}

#[tokio::test(start_paused = true)]
async fn circuit_breaker_through_client() {
    let breaker = CircuitBreaker::new();
    let client = Client::builder()
        .with_options(
            breaker.clone(),
            CircuitBreakerConfig::default()
                .with_failure_threshold(2)
                .with_open_duration(Duration::from_secs(5)),
        )
        .adapter(MockAdapter::new(|_| Ok(MockResponse::new(500))))
        .build()
        .expect("client");

    for _ in 0..2 {
        let ctx = client.get("/", RequestOptions::new()).await.expect("5xx");
        check!(ctx.is_server_error());
    }
    check!(breaker.circuit_state() == CircuitState::Open);

    let_assert!(Err(err) = client.get("/", RequestOptions::new()).await);
    check!(err.kind() == ErrorKind::Middleware);
}

// ============================================================================
// Tower interop
// ============================================================================

#[tokio::test]
async fn client_nests_as_service_adapter() {
    let inner = Client::builder()
        .with_options(AddHeader, header("x-inner", "1"))
        .adapter(EchoAdapter)
        .build()
        .expect("inner");
    let outer = Client::builder()
        .with_options(AddHeader, header("x-outer", "1"))
        .adapter(ServiceAdapter::new(inner))
        .build()
        .expect("outer");

    let ctx = outer.get("/", RequestOptions::new()).await.expect("get");
    check!(ctx.response_header("x-inner") == Some("1"));
    check!(ctx.response_header("x-outer") == Some("1"));
    check!(ctx.method() == Method::Get);
}
