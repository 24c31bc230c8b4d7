//! Response decompression middleware.
//!
//! Adds an `Accept-Encoding` header to requests and decodes responses based
//! on their `Content-Encoding` header (gzip, deflate, br, zstd).

use std::io::Read;

use bytes::Bytes;
use tessel_core::{Context, Error, LinkFuture, Middleware, Next, Result};
use tracing::debug;

const ACCEPT_ENCODING: &str = "gzip, deflate, br, zstd";

/// Decompresses response bodies.
///
/// Place it after [`Json`](super::Json) in registration order so the JSON
/// decoder sees the decompressed bytes.
///
/// # Example
///
/// ```ignore
/// let client = Client::builder()
///     .with(Json)
///     .with(Decompression)
///     .hyper()
///     .build()?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Decompression;

impl Middleware for Decompression {
    type Options = ();

    fn name(&self) -> &'static str {
        "decompression"
    }

    fn call<'a>(&'a self, mut ctx: Context, next: Next<'a>, _options: &'a ()) -> LinkFuture<'a> {
        if ctx.header("accept-encoding").is_none() {
            ctx.put_header("accept-encoding", ACCEPT_ENCODING);
        }

        Box::pin(async move {
            let mut ctx = next.run(ctx).await?;

            let encoding = ctx
                .response_header("content-encoding")
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if encoding.is_empty() || encoding == "identity" {
                return Ok(ctx);
            }
            // HEAD, 204 and 304 responses carry the header without a payload
            if ctx.response_body().as_bytes().is_some_and(<[u8]>::is_empty) {
                return Ok(ctx);
            }

            let body = ctx.take_response_body().into_bytes()?;
            let compressed_len = body.len();
            let decompressed = decompress(&encoding, body)?;
            debug!(
                encoding = %encoding,
                compressed_len,
                decompressed_len = decompressed.len(),
                "response decompressed"
            );

            // The body no longer matches these
            let headers = ctx.response_headers_mut();
            headers.retain(|(name, _)| !name.eq_ignore_ascii_case("content-encoding"));
            headers.retain(|(name, _)| !name.eq_ignore_ascii_case("content-length"));
            headers.push(("content-length".to_string(), decompressed.len().to_string()));
            ctx.set_response_body(decompressed);

            Ok(ctx)
        })
    }
}

/// Decompress bytes based on encoding.
fn decompress(encoding: &str, body: Bytes) -> Result<Bytes> {
    let result = match encoding {
        "gzip" | "x-gzip" => {
            let mut decoder = flate2::read::GzDecoder::new(body.as_ref());
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| Error::invalid_response(format!("gzip decompression failed: {e}")))?;
            Bytes::from(decompressed)
        }
        "deflate" => {
            let mut decoder = flate2::read::DeflateDecoder::new(body.as_ref());
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| Error::invalid_response(format!("deflate decompression failed: {e}")))?;
            Bytes::from(decompressed)
        }
        "br" => {
            let mut decompressed = Vec::new();
            brotli::BrotliDecompress(&mut body.as_ref(), &mut decompressed)
                .map_err(|e| Error::invalid_response(format!("brotli decompression failed: {e}")))?;
            Bytes::from(decompressed)
        }
        "zstd" => {
            let decompressed = zstd::decode_all(body.as_ref())
                .map_err(|e| Error::invalid_response(format!("zstd decompression failed: {e}")))?;
            Bytes::from(decompressed)
        }
        // Unknown encodings are passed through as-is
        _ => body,
    };

    Ok(result)
}
