//! axum adapter and standalone server for Labhook

pub mod body;
pub mod metrics;
pub mod middleware;
pub mod server;

pub use self::metrics::MetricsRecorder;
pub use middleware::{webhook_middleware, WebhookState};
pub use server::WebhookServer;
