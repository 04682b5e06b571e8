//! Labhook Core Library
//!
//! Configuration, error types, the subscriber registry and the GitLab webhook
//! dispatcher. The dispatcher classifies a request, validates its headers and
//! fans validated payloads out to subscribers.

pub mod config;
pub mod dispatcher;
pub mod emitter;
pub mod error;
pub mod types;
pub mod utils;

pub use config::{LabhookConfig, WebhookConfig};
pub use dispatcher::{DispatchError, Outcome, WebhookDispatcher};
pub use emitter::{EventEmitter, SubscriptionId};
pub use error::{Error, ListenerError, RejectionReason, Result};
pub use types::{Event, WebhookRequest, WebhookResponse};

/// Labhook version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header carrying the shared secret token
pub const TOKEN_HEADER: &str = "x-gitlab-token";

/// Header carrying the event name
pub const EVENT_HEADER: &str = "x-gitlab-event";

/// Header carrying the per-delivery UUID
pub const EVENT_UUID_HEADER: &str = "x-gitlab-event-uuid";

/// Header carrying the sending GitLab instance URL
pub const INSTANCE_HEADER: &str = "x-gitlab-instance";

/// Channel receiving every accepted event
pub const WILDCARD_CHANNEL: &str = "*";

/// Channel receiving validation failures
pub const ERROR_CHANNEL: &str = "error";

/// Default request body limit (25 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;
