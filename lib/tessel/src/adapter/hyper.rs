//! HTTP transport using hyper-util.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tessel_core::{Adapter, Context, Error, Headers, LinkFuture, Result};
use tracing::trace;

use crate::config::ClientConfig;
use crate::connector::https_connector;

/// Options bound to a [`HyperAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HyperOptions {
    /// Deadline for the whole exchange, body included.
    pub timeout: Duration,
}

impl Default for HyperOptions {
    fn default() -> Self {
        Self {
            timeout: ClientConfig::default().timeout,
        }
    }
}

impl From<&ClientConfig> for HyperOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            timeout: config.timeout,
        }
    }
}

/// Adapter performing the exchange with hyper, rustls and a connection pool.
///
/// The context URL must be absolute by the time it reaches the adapter;
/// query parameters from the context are appended to it. A JSON body must
/// have been encoded by a middleware.
///
/// # Example
///
/// ```ignore
/// use tessel::{Client, adapter::HyperAdapter};
///
/// let client = Client::builder()
///     .adapter(HyperAdapter::new())
///     .build()?;
/// ```
#[derive(Clone)]
pub struct HyperAdapter {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl fmt::Debug for HyperAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperAdapter").finish_non_exhaustive()
    }
}

impl Default for HyperAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperAdapter {
    /// Create an adapter with default pool settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ClientConfig::default())
    }

    /// Create an adapter with the pool settings of `config`.
    #[must_use]
    pub fn with_config(config: &ClientConfig) -> Self {
        let connector = https_connector(config.connect_timeout);

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(connector);

        Self { inner }
    }

    /// Build the final URL from the context URL and query.
    fn build_url(ctx: &Context) -> Result<url::Url> {
        let mut url = url::Url::parse(ctx.url()).map_err(|err| {
            Error::invalid_request(format!("cannot send to `{}`: {err}", ctx.url()))
        })?;

        if !ctx.query().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, values) in ctx.query() {
                for value in values {
                    pairs.append_pair(name, value);
                }
            }
        }

        Ok(url)
    }

    /// Build a hyper request from a context.
    fn build_hyper_request(ctx: &Context) -> Result<http::Request<Full<Bytes>>> {
        let url = Self::build_url(ctx)?;

        let mut builder = http::Request::builder()
            .method(http::Method::from(ctx.method()))
            .uri(url.as_str());

        for (name, value) in ctx.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let body = ctx.body().clone().into_bytes()?;
        builder
            .body(Full::new(body))
            .map_err(|e| Error::invalid_request(e.to_string()))
    }

    /// Extract response headers, keeping repeated names.
    ///
    /// Values that are not valid UTF-8 are kept lossily.
    fn extract_headers(headers: &http::HeaderMap) -> Headers {
        headers
            .iter()
            .map(|(name, value)| {
                let value = value.to_str().map_or_else(
                    |_| {
                        trace!(header = %name, "non UTF-8 header value decoded lossily");
                        String::from_utf8_lossy(value.as_bytes()).into_owned()
                    },
                    ToString::to_string,
                );
                (name.to_string(), value)
            })
            .collect()
    }

    async fn execute(&self, mut ctx: Context, timeout: Duration) -> Result<Context> {
        let hyper_request = Self::build_hyper_request(&ctx)?;

        let exchange = async {
            let response = self
                .inner
                .request(hyper_request)
                .await
                .map_err(Self::map_hyper_error)?;

            let status = response.status().as_u16();
            let headers = Self::extract_headers(response.headers());
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| Error::connection(e.to_string()))?
                .to_bytes();

            Ok::<_, Error>((status, headers, body))
        };

        let (status, headers, body) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| Error::timeout())??;

        trace!(status, bytes = body.len(), "response received");
        ctx.set_response(status, headers, body);
        Ok(ctx)
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = err.to_string();
        let detail = std::error::Error::source(&err)
            .map(ToString::to_string)
            .unwrap_or_default();
        let lowered = format!("{msg} {detail}").to_lowercase();

        if lowered.contains("ssl") || lowered.contains("tls") || lowered.contains("certificate") {
            return Error::tls(format!("{msg}: {detail}"));
        }

        if err.is_connect() {
            return Error::connection(format!("{msg}: {detail}"));
        }

        Error::connection(msg)
    }
}

impl Adapter for HyperAdapter {
    type Options = HyperOptions;

    fn name(&self) -> &'static str {
        "hyper"
    }

    fn validate(&self, options: &HyperOptions) -> Result<()> {
        if options.timeout.is_zero() {
            return Err(Error::configuration("timeout must be greater than zero"));
        }
        Ok(())
    }

    fn call<'a>(&'a self, ctx: Context, options: &'a HyperOptions) -> LinkFuture<'a> {
        Box::pin(self.execute(ctx, options.timeout))
    }
}
