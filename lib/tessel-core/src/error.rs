//! Error types for tessel.
//!
//! Every failure belongs to one of four kinds (see [`ErrorKind`]):
//!
//! - configuration errors abort client construction,
//! - transport errors come from the adapter,
//! - middleware errors are raised by a link for domain reasons,
//! - misuse errors flag a broken pipeline contract.
//!
//! Transport and middleware errors unwind through the chain and can be
//! recovered by any enclosing link.

use derive_more::{Display, Error, From};

// ============================================================================
// Error Kind
// ============================================================================

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// Invalid client construction.
    #[display("configuration")]
    Configuration,
    /// Network or adapter failure.
    #[display("transport")]
    Transport,
    /// Domain-specific failure signaled by a link.
    #[display("middleware")]
    Middleware,
    /// Violation of the pipeline contract.
    #[display("misuse")]
    Misuse,
}

// ============================================================================
// Transport Error
// ============================================================================

/// Failure reported by an adapter while performing the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum TransportError {
    /// Network/connection errors (refused, reset, DNS failure).
    #[display("connection error: {_0}")]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    Tls(#[error(not(source))] String),

    /// The exchange did not complete in time.
    #[display("request timeout")]
    Timeout,

    /// The context could not be turned into a request on the wire.
    #[display("invalid request: {_0}")]
    InvalidRequest(#[error(not(source))] String),

    /// The peer answered with something the adapter could not read.
    #[display("invalid response: {_0}")]
    InvalidResponse(#[error(not(source))] String),
}

// ============================================================================
// Error Type
// ============================================================================

/// Main error type for tessel operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Invalid client construction (missing adapter, rejected options).
    #[display("configuration error: {_0}")]
    #[from(skip)]
    Configuration(#[error(not(source))] String),

    /// Adapter failure.
    #[display("{_0}")]
    #[from]
    Transport(TransportError),

    /// A link refused or failed the exchange.
    #[display("{link} middleware error: {message}")]
    #[from(skip)]
    Middleware {
        /// Name of the link that raised the error.
        link: String,
        /// Error message.
        message: String,
    },

    /// A link broke the pipeline contract.
    #[display("pipeline misuse: {_0}")]
    #[from(skip)]
    Misuse(#[error(not(source))] String),

    /// An error re-propagated by an enclosing link with extra context.
    #[display("{context}: {source}")]
    #[from(skip)]
    Annotated {
        /// Context added by the enclosing link.
        context: String,
        /// The original error.
        source: Box<Error>,
    },
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Transport(TransportError::Connection(message.into()))
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Transport(TransportError::Tls(message.into()))
    }

    /// Create a timeout error.
    #[must_use]
    pub const fn timeout() -> Self {
        Self::Transport(TransportError::Timeout)
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::Transport(TransportError::InvalidRequest(message.into()))
    }

    /// Create an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::Transport(TransportError::InvalidResponse(message.into()))
    }

    /// Create a middleware error raised by the named link.
    #[must_use]
    pub fn middleware(link: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Middleware {
            link: link.into(),
            message: message.into(),
        }
    }

    /// Create a misuse error.
    #[must_use]
    pub fn misuse(message: impl Into<String>) -> Self {
        Self::Misuse(message.into())
    }

    /// Wrap this error with additional context, keeping its kind.
    #[must_use]
    pub fn annotate(self, context: impl Into<String>) -> Self {
        Self::Annotated {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The kind of this error, looking through annotations.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Middleware { .. } => ErrorKind::Middleware,
            Self::Misuse(_) => ErrorKind::Misuse,
            Self::Annotated { source, .. } => source.kind(),
        }
    }

    /// The innermost error, with all annotations removed.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Annotated { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the transport error, if this is one.
    #[must_use]
    pub fn transport(&self) -> Option<&TransportError> {
        match self.root() {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }

    /// Returns `true` if this is a transport error.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Returns `true` if this is a middleware error.
    #[must_use]
    pub fn is_middleware(&self) -> bool {
        self.kind() == ErrorKind::Middleware
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Returns `true` if this is a misuse error.
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        self.kind() == ErrorKind::Misuse
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.transport(), Some(TransportError::Timeout))
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self.transport(), Some(TransportError::Connection(_)))
    }

    /// Returns the name of the link that raised a middleware error.
    #[must_use]
    pub fn link(&self) -> Option<&str> {
        match self.root() {
            Self::Middleware { link, .. } => Some(link),
            _ => None,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::invalid_request(format!("invalid URL: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::middleware("json", err.to_string())
    }
}
