//! Adapter that echoes the request back.

use tessel_core::{Adapter, Context, LinkFuture};

/// Adapter that answers `200 OK` with the request headers and body.
///
/// No network activity takes place; useful for exercising middleware.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoAdapter;

impl Adapter for EchoAdapter {
    type Options = ();

    fn name(&self) -> &'static str {
        "echo"
    }

    fn call<'a>(&'a self, mut ctx: Context, _options: &'a ()) -> LinkFuture<'a> {
        let headers = ctx.headers().clone();
        let body = ctx.body().clone();
        ctx.set_response(200, headers, body);
        Box::pin(async move { Ok(ctx) })
    }
}
