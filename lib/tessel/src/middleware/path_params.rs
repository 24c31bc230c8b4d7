//! Path template substitution.
//!
//! Fills `{name}` and `:name` placeholders in the path of the request URL
//! with values from the context scratch space, stored under
//! [`PATH_PARAMS_KEY`] as a JSON object. Values are percent-encoded as a
//! single path segment.
//!
//! The unresolved URL is kept in the context extensions as a
//! [`PathTemplate`], so later links can group requests by route.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::Value;
use tessel_core::{Context, Error, LinkFuture, Middleware, Next, PathTemplate, Result};

/// Scratch key holding the path parameter object.
pub const PATH_PARAMS_KEY: &str = "path_params";

// Encodes everything except unreserved characters and sub-delims.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'%');

/// Replaces path placeholders with values from `ctx.get("path_params")`.
///
/// A `{name}` placeholder without a value fails the exchange with a
/// middleware error. A `:name` segment without a value is left as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathParams;

impl Middleware for PathParams {
    type Options = ();

    fn name(&self) -> &'static str {
        "path_params"
    }

    fn call<'a>(&'a self, mut ctx: Context, next: Next<'a>, _options: &'a ()) -> LinkFuture<'a> {
        Box::pin(async move {
            let template = ctx.url().to_string();
            let resolved = {
                let params = ctx.get(PATH_PARAMS_KEY);
                expand(&template, params)?
            };

            if resolved != template {
                ctx.set_url(resolved);
            }
            ctx.extensions_mut().insert(PathTemplate::new(template));

            next.run(ctx).await
        })
    }
}

fn expand(url: &str, params: Option<&Value>) -> Result<String> {
    let (prefix, rest) = split_path(url);
    let path_end = rest.find(['?', '#']).unwrap_or(rest.len());
    let (path, suffix) = rest.split_at(path_end);

    let mut out = String::with_capacity(url.len());
    out.push_str(prefix);

    let mut rest = path;
    while let Some(pos) = rest.find(['{', ':']) {
        let (head, tail) = rest.split_at(pos);
        out.push_str(head);

        if let Some(inner) = tail.strip_prefix('{') {
            let Some((name, after)) = inner.split_once('}') else {
                rest = tail;
                break;
            };
            let value = lookup(params, name)?.ok_or_else(|| {
                Error::middleware(
                    "path_params",
                    format!("missing value for path parameter `{name}`"),
                )
            })?;
            out.push_str(&value);
            rest = after;
        } else if let Some(inner) = tail.strip_prefix(':') {
            let (name, after) = inner.split_at(identifier_len(inner));
            let value = if !name.is_empty() && out.ends_with('/') {
                lookup(params, name)?
            } else {
                None
            };
            match value {
                Some(value) => {
                    out.push_str(&value);
                    rest = after;
                }
                None => {
                    out.push(':');
                    rest = inner;
                }
            }
        }
    }

    out.push_str(rest);
    out.push_str(suffix);
    Ok(out)
}

// Splits `scheme://authority` from the rest so ports are never mistaken for `:name`.
fn split_path(url: &str) -> (&str, &str) {
    let Some((scheme, rest)) = url.split_once("://") else {
        return ("", url);
    };
    let authority_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    url.split_at(scheme.len() + 3 + authority_len)
}

fn identifier_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map_or(s.len(), |(i, _)| i)
}

fn lookup(params: Option<&Value>, name: &str) -> Result<Option<String>> {
    let Some(value) = params.and_then(|p| p.get(name)) else {
        return Ok(None);
    };
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => {
            return Err(Error::middleware(
                "path_params",
                format!("path parameter `{name}` must be a scalar, got {other}"),
            ));
        }
    };
    Ok(Some(utf8_percent_encode(&raw, PATH_SEGMENT).to_string()))
}
