//! GitLab webhook middleware
//!
//! Requests that do not target the configured route are forwarded to the
//! next handler untouched. Matching requests are consumed: the body is
//! decoded, the dispatcher validates and notifies subscribers, and its
//! response is sent.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use labhook_core::{
    utils::generate_request_id, Error, Outcome, WebhookDispatcher, WebhookRequest,
    WebhookResponse, DEFAULT_MAX_BODY_BYTES, EVENT_UUID_HEADER, INSTANCE_HEADER,
};
use serde_json::json;
use std::time::Instant;
use tracing::{debug, error, info_span, Instrument};

use crate::body::decode_body;
use crate::metrics::{record_subscriber_failure, record_webhook_request, RequestOutcome};

/// State shared with [`webhook_middleware`]
#[derive(Debug, Clone)]
pub struct WebhookState {
    pub dispatcher: WebhookDispatcher,
    pub max_body_bytes: usize,
}

impl WebhookState {
    pub fn new(dispatcher: WebhookDispatcher) -> Self {
        Self {
            dispatcher,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// Webhook middleware for `axum::middleware::from_fn_with_state`
pub async fn webhook_middleware(
    State(state): State<WebhookState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();

    if !state
        .dispatcher
        .matches(request.method(), request.uri().path())
    {
        record_webhook_request(RequestOutcome::PassedThrough, 0.0);
        return next.run(request).await;
    }

    let span = {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .unwrap_or_else(|| "none".to_string())
        };
        info_span!(
            "gitlab_webhook",
            request_id = %generate_request_id(),
            event_uuid = %header(EVENT_UUID_HEADER),
            instance = %header(INSTANCE_HEADER),
        )
    };

    async move {
        let (parts, body) = request.into_parts();
        let decoded = decode_body(body, state.max_body_bytes).await;

        let webhook_request = WebhookRequest {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            body: decoded.json,
        };

        let result = state.dispatcher.handle(&webhook_request);
        let (outcome, response) = match result {
            Ok(Outcome::Responded(response)) => {
                let outcome = if response.is_success() {
                    RequestOutcome::Accepted
                } else {
                    RequestOutcome::Rejected
                };
                (outcome, render(response))
            }
            Ok(Outcome::PassThrough) => {
                record_webhook_request(RequestOutcome::PassedThrough, 0.0);
                return next
                    .run(Request::from_parts(parts, Body::from(decoded.raw)))
                    .await;
            }
            Err(err) => {
                if let Error::Listener { channel, .. } = &err.error {
                    record_subscriber_failure(channel);
                }
                error!("Webhook subscriber failed: {}", err);

                match err.response {
                    Some(response) => (RequestOutcome::Rejected, render(response)),
                    None => (RequestOutcome::Failed, internal_error()),
                }
            }
        };

        let duration = start.elapsed().as_secs_f64();
        record_webhook_request(outcome, duration);
        debug!(
            outcome = outcome.as_str(),
            status = %response.status(),
            duration_ms = %(duration * 1000.0),
            "Webhook request completed"
        );

        response
    }
    .instrument(span)
    .await
}

fn render(response: WebhookResponse) -> Response {
    (response.status, Json(response.body)).into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::{middleware, routing::get, Router};
    use labhook_core::{Event, WebhookConfig};
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(dispatcher: WebhookDispatcher) -> Router {
        Router::new()
            .route("/other", get(|| async { "inner" }).post(|| async { "inner post" }))
            .fallback(|| async { (StatusCode::NOT_FOUND, "fallback") })
            .layer(middleware::from_fn_with_state(
                WebhookState::new(dispatcher).with_max_body_bytes(1024),
                webhook_middleware,
            ))
    }

    fn dispatcher(secret: &str) -> WebhookDispatcher {
        WebhookDispatcher::new(WebhookConfig::new("/gitlab/hook", secret))
    }

    fn hook(token: Option<&str>, event: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/gitlab/hook")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("X-Gitlab-Token", token);
        }
        if let Some(event) = event {
            builder = builder.header("X-Gitlab-Event", event);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    const PUSH: &str =
        r#"{"event_name":"push","repository":{"name":"demo"},"ref":"refs/heads/main"}"#;

    async fn read(response: Response) -> (StatusCode, String) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_non_matching_requests_reach_inner_router() {
        let dispatcher = dispatcher("");
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        dispatcher.on("*", move |_| {
            *counter.lock() += 1;
            Ok(())
        });
        let app = app(dispatcher);

        let response = app
            .clone()
            .oneshot(Request::get("/other").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(read(response).await, (StatusCode::OK, "inner".to_string()));

        let response = app
            .clone()
            .oneshot(Request::get("/gitlab/hook").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            read(response).await,
            (StatusCode::NOT_FOUND, "fallback".to_string())
        );

        let response = app
            .oneshot(hook(Some("abc"), Some("Push Hook"), PUSH))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(*hits.lock(), 1);
    }

    #[tokio::test]
    async fn test_post_to_other_path_passes_through() {
        let response = app(dispatcher(""))
            .oneshot(
                Request::post("/other")
                    .header("X-Gitlab-Token", "abc")
                    .body(Body::from(PUSH))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            read(response).await,
            (StatusCode::OK, "inner post".to_string())
        );
    }

    #[tokio::test]
    async fn test_accepted_push() {
        let dispatcher = dispatcher("");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = seen.clone();
        dispatcher.on("*", move |event| {
            log.lock().push(format!(
                "* {:?} {:?}",
                event.event_name(),
                event.repository()
            ));
            Ok(())
        });
        let log = seen.clone();
        dispatcher.on("demo", move |event| {
            if let Event::Repository { payload, .. } = event {
                log.lock()
                    .push(format!("demo {}", payload["ref"].as_str().unwrap_or("")));
            }
            Ok(())
        });

        let response = app(dispatcher)
            .oneshot(hook(Some("anything"), Some("Push Hook"), PUSH))
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert_eq!(
            read(response).await,
            (StatusCode::OK, r#"{"success":true}"#.to_string())
        );
        assert_eq!(
            *seen.lock(),
            vec![
                r#"* Some("push") Some("demo")"#.to_string(),
                "demo refs/heads/main".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_rejections() {
        let cases = [
            (None, Some("Push Hook"), PUSH, "No token found in the request"),
            (Some("abc"), None, PUSH, "No event found in the request"),
            (Some("abc"), Some("Push Hook"), "", "Make sure body-parser is used"),
            (Some("abc"), Some("Push Hook"), "not json", "Make sure body-parser is used"),
            (Some("xyz"), Some("Push Hook"), PUSH, "Failed to verify secret"),
        ];

        for (token, event, body, message) in cases {
            let dispatcher = dispatcher("abc");
            let errors = Arc::new(Mutex::new(Vec::new()));
            let log = errors.clone();
            dispatcher.on("error", move |event| {
                if let Event::Error { error, .. } = event {
                    log.lock().push(error.to_string());
                }
                Ok(())
            });

            let response = app(dispatcher)
                .oneshot(hook(token, event, body))
                .await
                .unwrap();
            let (status, text) = read(response).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            let body: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(body, json!({ "error": message }));
            assert_eq!(*errors.lock(), vec![message.to_string()]);
        }
    }

    #[tokio::test]
    async fn test_oversized_body_is_missing_body() {
        let big = format!(r#"{{"event_name":"push","pad":"{}"}}"#, "x".repeat(2048));
        let response = app(dispatcher(""))
            .oneshot(hook(Some("abc"), Some("Push Hook"), &big))
            .await
            .unwrap();
        let (status, text) = read(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(text, r#"{"error":"Make sure body-parser is used"}"#);
    }

    #[tokio::test]
    async fn test_non_ascii_token_matches_secret() {
        let request = |token: &str| {
            let mut request = hook(None, Some("Push Hook"), PUSH);
            request.headers_mut().insert(
                "x-gitlab-token",
                HeaderValue::from_bytes(token.as_bytes()).unwrap(),
            );
            request
        };

        let app = app(dispatcher("pässword"));
        let response = app.clone().oneshot(request("pässword")).await.unwrap();
        assert_eq!(
            read(response).await,
            (StatusCode::OK, r#"{"success":true}"#.to_string())
        );

        let response = app.oneshot(request("passwörd")).await.unwrap();
        assert_eq!(
            read(response).await,
            (
                StatusCode::BAD_REQUEST,
                r#"{"error":"Failed to verify secret"}"#.to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_failing_subscriber_returns_500() {
        let dispatcher = dispatcher("");
        dispatcher.on("push", |_| Err("handler crashed".into()));

        let response = app(dispatcher)
            .oneshot(hook(Some("abc"), Some("Push Hook"), PUSH))
            .await
            .unwrap();
        let (status, text) = read(response).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(text, r#"{"error":"Internal server error"}"#);
    }

    #[tokio::test]
    async fn test_failing_error_subscriber_still_sends_400() {
        let dispatcher = dispatcher("");
        dispatcher.on("error", |_| Err("error handler crashed".into()));

        let response = app(dispatcher)
            .oneshot(hook(None, Some("Push Hook"), PUSH))
            .await
            .unwrap();
        let (status, text) = read(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(text, r#"{"error":"No token found in the request"}"#);
    }
}
