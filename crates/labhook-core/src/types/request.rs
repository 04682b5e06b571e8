//! Webhook request and response values
//!
//! [`WebhookRequest`] is the read-only view of an inbound request the
//! dispatcher classifies. The body is expected to be decoded by an upstream
//! collaborator; `None` means nothing decoded it.

use std::borrow::Cow;

use http::{header::HeaderName, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use serde_json::{json, Value};

use crate::RejectionReason;

#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl WebhookRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Shorthand for a `POST` to `uri`
    pub fn post(uri: Uri) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Request path with any query string removed
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Raw header value. Only a missing or empty header is `None`; values
    /// with bytes outside visible ASCII are returned as sent.
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .get(name)
            .map(HeaderValue::as_bytes)
            .filter(|v| !v.is_empty())
    }

    /// Header value for display, with invalid UTF-8 replaced
    pub fn header_lossy(&self, name: &str) -> Option<Cow<'_, str>> {
        self.header(name).map(String::from_utf8_lossy)
    }
}

/// Response produced for a matched request.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl WebhookResponse {
    /// `200 {"success": true}`
    pub fn success() -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({ "success": true }),
        }
    }

    /// `400 {"error": "<reason>"}`
    pub fn rejected(reason: RejectionReason) -> Self {
        Self {
            status: StatusCode::from_u16(reason.http_status()).unwrap_or(StatusCode::BAD_REQUEST),
            body: json!({ "error": reason.to_string() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
