//! Request body decoding
//!
//! Buffers the request body and decodes it as JSON ahead of dispatch. A body
//! that is empty, too large or not JSON decodes to `None`, which the
//! dispatcher reports as a missing body.

use axum::body::Body;
use bytes::Bytes;
use serde_json::Value;
use tracing::warn;

/// Buffered body plus its JSON decoding
#[derive(Debug, Clone, Default)]
pub struct DecodedBody {
    pub raw: Bytes,
    pub json: Option<Value>,
}

pub async fn decode_body(body: Body, limit: usize) -> DecodedBody {
    let raw = match axum::body::to_bytes(body, limit).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(limit, "Failed to buffer webhook body: {}", e);
            return DecodedBody::default();
        }
    };

    if raw.is_empty() {
        return DecodedBody { raw, json: None };
    }

    let json = match serde_json::from_slice(&raw) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(size = raw.len(), "Webhook body is not valid JSON: {}", e);
            None
        }
    };

    DecodedBody { raw, json }
}
