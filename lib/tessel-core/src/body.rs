//! Request and response bodies.

use bytes::Bytes;

/// Payload carried by a [`Context`](crate::Context).
///
/// The shape is negotiated between links: a client may hand over a
/// [`Body::Json`] value that an encoding middleware turns into
/// [`Body::Bytes`] before the adapter sees it, and the same middleware may
/// decode the response back into [`Body::Json`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    /// No payload.
    #[default]
    Empty,
    /// Raw bytes, ready for the wire.
    Bytes(Bytes),
    /// UTF-8 text.
    Text(String),
    /// Structured JSON value, not yet encoded.
    Json(serde_json::Value),
}

impl Body {
    /// Returns `true` for [`Body::Empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Serialize any value into a [`Body::Json`].
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    pub fn json<T: serde::Serialize>(value: &T) -> crate::Result<Self> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Borrow the payload as bytes, when it has a wire representation.
    ///
    /// Returns `None` for [`Body::Json`], which must be encoded first.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Empty => Some(&[]),
            Self::Bytes(bytes) => Some(bytes),
            Self::Text(text) => Some(text.as_bytes()),
            Self::Json(_) => None,
        }
    }

    /// Borrow the JSON value, if the body is decoded JSON.
    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the payload as text, if it is text or valid UTF-8 bytes.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            Self::Empty => Some(""),
            Self::Json(_) => None,
        }
    }

    /// Consume into wire bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is JSON that no middleware encoded.
    pub fn into_bytes(self) -> crate::Result<Bytes> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Bytes(bytes) => Ok(bytes),
            Self::Text(text) => Ok(Bytes::from(text)),
            Self::Json(_) => Err(crate::Error::invalid_request(
                "JSON body was not encoded; add the json middleware",
            )),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}
