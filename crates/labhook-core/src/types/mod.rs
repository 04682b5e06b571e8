//! Core types for Labhook

pub mod event;
pub mod request;

pub use event::{Event, GitlabPayload};
pub use request::{WebhookRequest, WebhookResponse};
