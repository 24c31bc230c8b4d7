//! Path template kept for middleware access.

use std::fmt;

/// The original path template before parameter substitution.
///
/// The path-params middleware stores it in the context extensions so later
/// links (logging, telemetry) can group requests by route (`/users/{id}`)
/// rather than by resolved path (`/users/123`).
///
/// # Example
///
/// ```ignore
/// if let Some(template) = ctx.extensions().get::<PathTemplate>() {
///     tracing::info!(route = template.as_str(), "request");
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathTemplate(String);

impl PathTemplate {
    /// Create a new path template.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Get the template string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PathTemplate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
