//! JSON request encoding and response decoding.

use bytes::Bytes;
use serde_json::Value;
use tessel_core::{Body, Context, Error, LinkFuture, Middleware, Next, Result};

const APPLICATION_JSON: &str = "application/json";

/// Options for the [`Json`] middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonOptions {
    /// Serialize `Body::Json` request bodies to bytes.
    pub encode: bool,
    /// Parse JSON response bodies into `Body::Json`.
    pub decode: bool,
    /// Content type sent with encoded bodies.
    pub content_type: String,
    /// Extra response content types treated as JSON, besides
    /// `application/json` and any `+json` suffix.
    pub accept: Vec<String>,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            encode: true,
            decode: true,
            content_type: APPLICATION_JSON.to_string(),
            accept: Vec::new(),
        }
    }
}

impl JsonOptions {
    fn is_json(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        essence == APPLICATION_JSON
            || essence.ends_with("+json")
            || self.accept.iter().any(|c| c.eq_ignore_ascii_case(&essence))
    }
}

/// Encodes JSON request bodies and decodes JSON responses.
///
/// On the way down, a `Body::Json` request body becomes bytes with a
/// `Content-Type` header, and `Accept: application/json` is added when no
/// `Accept` header is present. On the way back up, a response whose content
/// type is JSON is parsed into `Body::Json`.
///
/// Malformed JSON fails the exchange with a middleware error naming the
/// offending path.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Middleware for Json {
    type Options = JsonOptions;

    fn name(&self) -> &'static str {
        "json"
    }

    fn validate(&self, options: &JsonOptions) -> Result<()> {
        if options.encode && options.content_type.trim().is_empty() {
            return Err(Error::configuration("content type must not be empty"));
        }
        Ok(())
    }

    fn call<'a>(
        &'a self,
        mut ctx: Context,
        next: Next<'a>,
        options: &'a JsonOptions,
    ) -> LinkFuture<'a> {
        Box::pin(async move {
            if options.encode {
                encode_request(&mut ctx, options)?;
            }

            let mut ctx = next.run(ctx).await?;

            if options.decode {
                decode_response(&mut ctx, options)?;
            }
            Ok(ctx)
        })
    }
}

fn encode_request(ctx: &mut Context, options: &JsonOptions) -> Result<()> {
    if ctx.header("accept").is_none() {
        ctx.put_header("Accept", APPLICATION_JSON);
    }

    if let Body::Json(value) = ctx.body() {
        let bytes = serde_json::to_vec(value)?;
        ctx.set_body(Bytes::from(bytes));
        if ctx.header("content-type").is_none() {
            ctx.put_header("Content-Type", options.content_type.clone());
        }
    }
    Ok(())
}

fn decode_response(ctx: &mut Context, options: &JsonOptions) -> Result<()> {
    let is_json = ctx
        .response_header("content-type")
        .is_some_and(|c| options.is_json(c));
    if !is_json {
        return Ok(());
    }

    let value = match ctx.response_body() {
        Body::Bytes(bytes) if !bytes.is_empty() => from_json::<Value>(bytes)?,
        Body::Text(text) if !text.is_empty() => from_json::<Value>(text.as_bytes())?,
        _ => return Ok(()),
    };
    ctx.set_response_body(value);
    Ok(())
}

/// Deserialize JSON bytes with path-aware error messages.
///
/// # Errors
///
/// Returns a middleware error on the `json` link whose message includes the
/// path to the field that failed (e.g. `user.address.city`).
///
/// # Example
///
/// ```
/// use serde::Deserialize;
/// use tessel::middleware::from_json;
///
/// #[derive(Debug, PartialEq, Deserialize)]
/// struct User { name: String }
///
/// let user: User = from_json(br#"{"name":"Alice"}"#).expect("deserialize");
/// assert_eq!(user, User { name: "Alice".to_string() });
/// ```
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        Error::middleware(
            "json",
            format!("invalid JSON at `{}`: {}", e.path(), e.inner()),
        )
    })
}
