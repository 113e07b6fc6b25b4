//! `GET /control/{command}` -> publish the command on the robot topic

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use robot_shared::CommandPublisher;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Body returned when a command has been handed to the publisher
pub const QUEUED: &str = "queued";

/// How the control route answers when publishing fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    /// Always answer `queued`, whatever happened to the publish
    #[default]
    Optimistic,
    /// Answer `502 Bad Gateway` when the publish failed
    Truthful,
}

/// Shared state for the control route
#[derive(Clone)]
pub struct AppState {
    publisher: Arc<dyn CommandPublisher>,
    topic: Arc<str>,
    ack_mode: AckMode,
}

impl AppState {
    pub fn new(publisher: Arc<dyn CommandPublisher>, topic: &str, ack_mode: AckMode) -> Self {
        Self {
            publisher,
            topic: Arc::from(topic),
            ack_mode,
        }
    }
}

/// Build the router for the control surface
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/control/:command", get(control))
        .with_state(state)
}

async fn control(State(state): State<AppState>, Path(command): Path<String>) -> Response {
    info!("Control request: {}", command);

    match state.publisher.publish(&state.topic, &command).await {
        Ok(ack) => {
            info!("Published {:?} to {}", ack.payload, ack.topic);
            (StatusCode::OK, QUEUED).into_response()
        }
        Err(e) => match state.ack_mode {
            AckMode::Optimistic => {
                warn!("Publish of {:?} failed, answering queued anyway: {}", command, e);
                (StatusCode::OK, QUEUED).into_response()
            }
            AckMode::Truthful => {
                error!("Publish of {:?} failed: {}", command, e);
                (StatusCode::BAD_GATEWAY, format!("publish failed: {}", e)).into_response()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use robot_shared::MemoryBroker;
    use tower::ServiceExt;

    const TOPIC: &str = "robots/test";

    async fn get_control(app: Router, command: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/control/{}", command))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn app(broker: &MemoryBroker, ack_mode: AckMode) -> Router {
        router(AppState::new(Arc::new(broker.clone()), TOPIC, ack_mode))
    }

    #[tokio::test]
    async fn test_control_publishes_command() {
        let broker = MemoryBroker::new();

        let (status, body) = get_control(app(&broker, AckMode::Optimistic), "forward").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, QUEUED);

        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, TOPIC);
        assert_eq!(published[0].1.as_ref(), b"forward");
    }

    #[tokio::test]
    async fn test_control_forwards_unknown_commands_verbatim() {
        let broker = MemoryBroker::new();

        let (status, _) = get_control(app(&broker, AckMode::Truthful), "jump").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(broker.published()[0].1.as_ref(), b"jump");
    }

    #[tokio::test]
    async fn test_optimistic_ack_hides_failure() {
        let broker = MemoryBroker::new();
        broker.set_reachable(false);

        let (status, body) = get_control(app(&broker, AckMode::Optimistic), "stop").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, QUEUED);
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_truthful_ack_reports_failure() {
        let broker = MemoryBroker::new();
        broker.set_reachable(false);

        let (status, body) = get_control(app(&broker, AckMode::Truthful), "stop").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.starts_with("publish failed"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let broker = MemoryBroker::new();
        let response = app(&broker, AckMode::Optimistic)
            .oneshot(Request::builder().uri("/control").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
