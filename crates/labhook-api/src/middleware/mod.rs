//! Middleware for mounting the webhook dispatcher in an axum router

mod webhook;

pub use webhook::{webhook_middleware, WebhookState};
