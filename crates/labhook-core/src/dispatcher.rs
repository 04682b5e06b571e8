//! Webhook Dispatcher
//!
//! Classifies inbound requests against the configured route, validates the
//! GitLab headers and fans accepted payloads out to subscribers.

use http::Method;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::emitter::{EventEmitter, SubscriptionId};
use crate::types::{Event, GitlabPayload, WebhookRequest, WebhookResponse};
use crate::utils::is_truthy;
use crate::{
    Error, ListenerError, RejectionReason, Result, WebhookConfig, ERROR_CHANNEL, EVENT_HEADER,
    TOKEN_HEADER, WILDCARD_CHANNEL,
};

/// Result of handing a request to the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Not our route; the host should call the next handler
    PassThrough,
    /// The request was consumed and this response must be sent
    Responded(WebhookResponse),
}

/// A subscriber failed while a request was being dispatched.
///
/// `response` is set when the failure happened after the response had
/// already been decided (the `error` channel on a rejected request). The host
/// must still send it. When `None`, no response was produced.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct DispatchError {
    #[source]
    pub error: Error,
    pub response: Option<WebhookResponse>,
}

/// GitLab webhook handler and event source.
///
/// Cloning yields another handle sharing the same configuration and
/// subscriber registry.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    config: Arc<WebhookConfig>,
    emitter: EventEmitter,
}

impl WebhookDispatcher {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config: Arc::new(config),
            emitter: EventEmitter::new(),
        }
    }

    /// Build a dispatcher from loosely typed options
    pub fn from_value(options: Value) -> Result<Self> {
        WebhookConfig::from_value(options).map(Self::new)
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Subscriber registry backing this dispatcher
    pub fn events(&self) -> &EventEmitter {
        &self.emitter
    }

    pub fn on<F>(&self, channel: &str, listener: F) -> SubscriptionId
    where
        F: Fn(&Event<'_>) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.emitter.on(channel, listener)
    }

    pub fn once<F>(&self, channel: &str, listener: F) -> SubscriptionId
    where
        F: Fn(&Event<'_>) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.emitter.once(channel, listener)
    }

    pub fn off(&self, channel: &str, id: SubscriptionId) -> bool {
        self.emitter.off(channel, id)
    }

    pub fn emit(&self, channel: &str, event: &Event<'_>) -> Result<bool> {
        self.emitter.emit(channel, event)
    }

    /// Whether a request with this method and path belongs to us
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        *method == Method::POST && path == self.config.path
    }

    /// Process one request.
    ///
    /// Non-matching requests yield [`Outcome::PassThrough`] without touching
    /// subscribers. Matching requests are validated; rejections produce a 400
    /// response plus an `error` notification, accepted requests notify the
    /// wildcard, event-name and repository-name channels in that order and
    /// produce a 200 response.
    pub fn handle(&self, request: &WebhookRequest) -> std::result::Result<Outcome, DispatchError> {
        if !self.matches(&request.method, request.path()) {
            debug!(method = %request.method, path = request.path(), "Passing request through");
            return Ok(Outcome::PassThrough);
        }

        match self.validate(request) {
            Ok(payload) => self.accept(payload),
            Err(reason) => self.reject(reason, request),
        }
    }

    fn validate<'r>(
        &self,
        request: &'r WebhookRequest,
    ) -> std::result::Result<&'r Value, RejectionReason> {
        let token = request
            .header(TOKEN_HEADER)
            .ok_or(RejectionReason::MissingToken)?;

        request
            .header(EVENT_HEADER)
            .ok_or(RejectionReason::MissingEvent)?;

        let payload = request
            .body
            .as_ref()
            .filter(|body| is_truthy(body))
            .ok_or(RejectionReason::MissingBody)?;

        if self.config.verifies_secret() && self.config.secret.as_bytes() != token {
            return Err(RejectionReason::SecretMismatch);
        }

        Ok(payload)
    }

    fn accept(&self, payload: &Value) -> std::result::Result<Outcome, DispatchError> {
        let gitlab = GitlabPayload::new(payload);
        let event_name = gitlab.event_name();
        let repository = gitlab.repository_name();

        info!(
            event = event_name.unwrap_or("-"),
            repository = repository.unwrap_or("-"),
            "Dispatching webhook event"
        );

        let fan_out = || -> Result<()> {
            self.emitter.emit(
                WILDCARD_CHANNEL,
                &Event::Any {
                    event_name,
                    repository,
                    payload,
                },
            )?;

            if let Some(name) = event_name {
                self.emitter
                    .emit(name, &Event::Named { repository, payload })?;
            }

            if let Some(repo) = repository {
                self.emitter
                    .emit(repo, &Event::Repository { event_name, payload })?;
            }

            Ok(())
        };

        fan_out().map_err(|error| DispatchError {
            error,
            response: None,
        })?;

        Ok(Outcome::Responded(WebhookResponse::success()))
    }

    fn reject(
        &self,
        reason: RejectionReason,
        request: &WebhookRequest,
    ) -> std::result::Result<Outcome, DispatchError> {
        warn!(reason = %reason, path = request.path(), "Rejecting webhook request");

        let response = WebhookResponse::rejected(reason);
        let event = Event::Error {
            error: reason,
            request,
            response: &response,
        };

        match self.emitter.emit(ERROR_CHANNEL, &event) {
            Ok(true) => {}
            Ok(false) => debug!("No subscribers on the error channel"),
            Err(error) => {
                return Err(DispatchError {
                    error,
                    response: Some(response),
                })
            }
        }

        Ok(Outcome::Responded(response))
    }
}
