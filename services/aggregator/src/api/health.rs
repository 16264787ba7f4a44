//! Health check endpoints.
//!
//! `/readyz` reports ready only while the subscriber holds a live
//! subscription to the actor channel.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

const SERVICE: &str = "actor-aggregator";

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status: "ok" or "degraded".
    pub status: String,

    pub service: String,

    pub version: String,

    /// Current timestamp (ISO 8601).
    pub timestamp: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ComponentHealth>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ComponentHealth {
    /// Actor channel subscription.
    pub subscriber: ComponentStatus,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ComponentStatus {
    /// Status: "ok" or "unavailable".
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/livez", get(livez))
}

fn response(status: &str, components: Option<ComponentHealth>) -> HealthResponse {
    HealthResponse {
        status: status.to_string(),
        service: SERVICE.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        components,
    }
}

/// Liveness of the HTTP server itself; no dependency checks.
async fn healthz() -> impl IntoResponse {
    Json(response("ok", None))
}

/// Returns 503 until the actor channel subscription is established.
async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let subscribed = state.readiness().is_ready();

    let components = ComponentHealth {
        subscriber: ComponentStatus {
            status: if subscribed { "ok" } else { "unavailable" }.to_string(),
            message: if subscribed {
                None
            } else {
                Some("not subscribed to actor channel".to_string())
            },
        },
    };

    if subscribed {
        (StatusCode::OK, Json(response("ok", Some(components))))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(response("degraded", Some(components))),
        )
    }
}

async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::Readiness;
    use crate::view::new_view;

    fn state(readiness: Readiness) -> AppState {
        let (_writer, view) = new_view(10);
        AppState::new(view, readiness, false)
    }

    #[tokio::test]
    async fn test_healthz_returns_ok() {
        let response = healthz().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_livez_returns_ok() {
        let response = livez().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readyz_follows_subscription() {
        let readiness = Readiness::new();
        let state = state(readiness.clone());

        let response = readyz(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        readiness.set_subscribed(true);
        let response = readyz(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
