//! Basic authentication middleware.
//!
//! This middleware adds an `Authorization: Basic <base64(user:pass)>` header
//! to every outgoing request.

use base64::Engine;
use tessel_core::{Context, LinkFuture, Middleware, Next};

/// Credentials bound to [`BasicAuth`], encoded once at construction.
#[derive(Clone)]
pub struct BasicCredentials {
    /// Base64-encoded "username:password".
    encoded: String,
}

impl BasicCredentials {
    /// Encode a username and password.
    pub fn new(username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        let credentials = format!("{}:{}", username.as_ref(), password.as_ref());
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        Self { encoded }
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BasicCredentials(***)")
    }
}

/// Adds basic authentication to requests.
///
/// # Example
///
/// ```ignore
/// use tessel::middleware::{BasicAuth, BasicCredentials};
///
/// let client = Client::builder()
///     .with_options(BasicAuth, BasicCredentials::new("username", "password"))
///     .hyper()
///     .build()?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAuth;

impl Middleware for BasicAuth {
    type Options = BasicCredentials;

    fn name(&self) -> &'static str {
        "basic_auth"
    }

    fn call<'a>(
        &'a self,
        mut ctx: Context,
        next: Next<'a>,
        credentials: &'a BasicCredentials,
    ) -> LinkFuture<'a> {
        ctx.put_header("Authorization", format!("Basic {}", credentials.encoded));
        Box::pin(async move { next.run(ctx).await })
    }
}
