//! Bearer token authentication middleware.
//!
//! This middleware adds an `Authorization: Bearer <token>` header to every
//! outgoing request.

use tessel_core::{Context, Error, LinkFuture, Middleware, Next, Result};

/// Adds bearer token authentication to requests.
///
/// The token is the bound option; an empty token is rejected when the
/// chain is built.
///
/// # Example
///
/// ```ignore
/// use tessel::middleware::BearerAuth;
///
/// let client = Client::builder()
///     .with_options(BearerAuth, "my-secret-token".to_string())
///     .hyper()
///     .build()?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerAuth;

impl Middleware for BearerAuth {
    type Options = String;

    fn name(&self) -> &'static str {
        "bearer_auth"
    }

    fn validate(&self, token: &String) -> Result<()> {
        if token.trim().is_empty() {
            return Err(Error::configuration("token must not be empty"));
        }
        Ok(())
    }

    fn call<'a>(&'a self, mut ctx: Context, next: Next<'a>, token: &'a String) -> LinkFuture<'a> {
        ctx.put_header("Authorization", format!("Bearer {token}"));
        Box::pin(async move { next.run(ctx).await })
    }
}
