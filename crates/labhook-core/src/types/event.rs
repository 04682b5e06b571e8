//! Event notifications delivered to subscribers

use serde_json::Value;

use crate::{RejectionReason, WebhookRequest, WebhookResponse};

/// Notification passed to subscriber callbacks.
///
/// The variant depends on the channel it was emitted on:
/// - `"*"` receives [`Event::Any`]
/// - an event-name channel receives [`Event::Named`]
/// - a repository-name channel receives [`Event::Repository`]
/// - `"error"` receives [`Event::Error`]
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// `event_name` and `repository` are `None` when the payload field is
    /// missing or not a string (e.g. `"event_name": 5`); the raw value is
    /// still in `payload`.
    Any {
        event_name: Option<&'a str>,
        repository: Option<&'a str>,
        payload: &'a Value,
    },
    Named {
        repository: Option<&'a str>,
        payload: &'a Value,
    },
    Repository {
        event_name: Option<&'a str>,
        payload: &'a Value,
    },
    Error {
        error: RejectionReason,
        request: &'a WebhookRequest,
        response: &'a WebhookResponse,
    },
}

impl<'a> Event<'a> {
    /// Decoded webhook payload, absent for [`Event::Error`]
    pub fn payload(&self) -> Option<&'a Value> {
        match *self {
            Event::Any { payload, .. }
            | Event::Named { payload, .. }
            | Event::Repository { payload, .. } => Some(payload),
            Event::Error { .. } => None,
        }
    }

    pub fn event_name(&self) -> Option<&'a str> {
        match *self {
            Event::Any { event_name, .. } | Event::Repository { event_name, .. } => event_name,
            Event::Named { payload, .. } => GitlabPayload::new(payload).event_name(),
            Event::Error { .. } => None,
        }
    }

    pub fn repository(&self) -> Option<&'a str> {
        match *self {
            Event::Any { repository, .. } | Event::Named { repository, .. } => repository,
            Event::Repository { payload, .. } => GitlabPayload::new(payload).repository_name(),
            Event::Error { .. } => None,
        }
    }
}

/// Typed accessors over a decoded GitLab payload.
///
/// Payloads are not schema-checked; any field may be missing or of an
/// unexpected type, in which case the accessor returns `None`.
#[derive(Debug, Clone, Copy)]
pub struct GitlabPayload<'a>(&'a Value);

impl<'a> GitlabPayload<'a> {
    pub fn new(payload: &'a Value) -> Self {
        Self(payload)
    }

    /// `payload.event_name`; `None` when missing or not a string, so a
    /// numeric `event_name` reaches only the wildcard channel
    pub fn event_name(&self) -> Option<&'a str> {
        self.0.get("event_name").and_then(Value::as_str)
    }

    /// `payload.repository.name`; `None` when missing, empty or not a string
    pub fn repository_name(&self) -> Option<&'a str> {
        self.0
            .get("repository")
            .and_then(|repo| repo.get("name"))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }
}
