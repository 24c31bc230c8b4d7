//! Static header and query middleware.

use tessel_core::{Context, Headers, LinkFuture, Middleware, Next};

/// Sets a fixed list of request headers, replacing existing values.
///
/// # Example
///
/// ```ignore
/// let client = Client::builder()
///     .with_options(SetHeaders, vec![("User-Agent".into(), "tessel".into())])
///     .hyper()
///     .build()?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SetHeaders;

impl Middleware for SetHeaders {
    type Options = Headers;

    fn name(&self) -> &'static str {
        "headers"
    }

    fn call<'a>(&'a self, mut ctx: Context, next: Next<'a>, headers: &'a Headers) -> LinkFuture<'a> {
        for (name, value) in headers {
            ctx.put_header(name.clone(), value.clone());
        }
        Box::pin(async move { next.run(ctx).await })
    }
}

/// Appends a fixed list of query values.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParams;

impl Middleware for QueryParams {
    type Options = Vec<(String, String)>;

    fn name(&self) -> &'static str {
        "query"
    }

    fn call<'a>(
        &'a self,
        mut ctx: Context,
        next: Next<'a>,
        params: &'a Vec<(String, String)>,
    ) -> LinkFuture<'a> {
        for (name, value) in params {
            ctx.append_query(name.clone(), value.clone());
        }
        Box::pin(async move { next.run(ctx).await })
    }
}
