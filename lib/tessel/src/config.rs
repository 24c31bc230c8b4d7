//! Client configuration types.
//!
//! [`ClientConfig`] carries the request defaults a [`Client`](crate::Client)
//! merges into every call, the transport settings of the hyper adapter, and
//! the default adapter used when a client is built without one. The default
//! adapter is an explicit field of the configuration value: there is no
//! process-global transport.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tessel_core::{AdapterLink, Headers, Result, adapter_with};

use crate::adapter::{HyperAdapter, HyperOptions};

/// Adapter used when a client is built without an explicit one.
#[derive(Clone)]
pub enum DefaultAdapter {
    /// The hyper/rustls transport, built from this configuration.
    Hyper,
    /// A pre-resolved adapter link.
    Custom(Arc<dyn AdapterLink>),
}

impl fmt::Debug for DefaultAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hyper => f.write_str("Hyper"),
            Self::Custom(link) => f.debug_tuple("Custom").field(&link.name()).finish(),
        }
    }
}

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL prepended to relative request paths.
    pub base_url: Option<String>,
    /// Headers added to every request (per-call headers win).
    pub headers: Headers,
    /// Request timeout duration (hyper adapter).
    pub timeout: Duration,
    /// Connection timeout duration (hyper adapter).
    pub connect_timeout: Duration,
    /// Maximum idle connections per host (hyper adapter).
    pub pool_idle_per_host: usize,
    /// Idle connection timeout (hyper adapter).
    pub pool_idle_timeout: Duration,
    /// Adapter used when the client builder is given none.
    pub default_adapter: Option<DefaultAdapter>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: Vec::new(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
            default_adapter: None,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Resolve the default adapter into a terminal link, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the adapter rejects the options
    /// derived from this configuration.
    pub fn resolve_default_adapter(&self) -> Result<Option<Arc<dyn AdapterLink>>> {
        match &self.default_adapter {
            None => Ok(None),
            Some(DefaultAdapter::Custom(link)) => Ok(Some(Arc::clone(link))),
            Some(DefaultAdapter::Hyper) => {
                let link = adapter_with(HyperAdapter::with_config(self), HyperOptions::from(self))?;
                Ok(Some(link))
            }
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    headers: Headers,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    pool_idle_per_host: Option<usize>,
    pool_idle_timeout: Option<Duration>,
    default_adapter: Option<DefaultAdapter>,
}

impl ClientConfigBuilder {
    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add a default header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.pool_idle_per_host = Some(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Use the hyper transport as the default adapter.
    #[must_use]
    pub fn hyper_default(mut self) -> Self {
        self.default_adapter = Some(DefaultAdapter::Hyper);
        self
    }

    /// Use a pre-resolved adapter link as the default adapter.
    #[must_use]
    pub fn default_adapter(mut self, adapter: Arc<dyn AdapterLink>) -> Self {
        self.default_adapter = Some(DefaultAdapter::Custom(adapter));
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            base_url: self.base_url,
            headers: self.headers,
            timeout: self.timeout.unwrap_or(defaults.timeout),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            pool_idle_per_host: self
                .pool_idle_per_host
                .unwrap_or(defaults.pool_idle_per_host),
            pool_idle_timeout: self.pool_idle_timeout.unwrap_or(defaults.pool_idle_timeout),
            default_adapter: self.default_adapter,
        }
    }
}
