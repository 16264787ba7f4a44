//! HTTP API handlers and routing.

mod dump;
pub mod error;
mod health;
mod logical;
mod response;

use axum::{
    http::{header, Method},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

pub use response::RestResponse;

/// Create the main API router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(Any);

    let mut router = Router::new()
        .merge(health::routes())
        .nest("/logical", logical::routes());

    if state.test_module_enabled() {
        router = router.nest("/test", dump::routes());
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::Readiness;
    use crate::view::{new_view, ActorWriter};
    use actorlens_events::{ActorEvent, ActorState, ActorUpdate};
    use actorlens_id::ActorId;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn test_router(enable_test_module: bool) -> (ActorWriter, Router) {
        let (writer, view) = new_view(10);
        let state = AppState::new(view, Readiness::new(), enable_test_module);
        (writer, create_router(state))
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_empty_view_lists_no_actors() {
        let (_writer, router) = test_router(false);
        let (status, body) = get(router, "/logical/actors").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], true);
        assert_eq!(body["msg"], "All actors fetched.");
        assert_eq!(body["data"]["actors"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_get_actor() {
        let (mut writer, router) = test_router(false);
        let actor_id = ActorId::random();
        writer
            .apply(&ActorEvent::new(
                actor_id,
                ActorUpdate::with_state(ActorState::Alive),
            ))
            .await
            .unwrap();

        let (status, body) = get(router.clone(), &format!("/logical/actors/{actor_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["actor"]["state"], "ALIVE");

        let (status, body) =
            get(router.clone(), &format!("/logical/actors/{}", ActorId::random())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "actor_not_found");

        let (status, _) = get(router, "/logical/actors/not-hex").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dump_requires_test_module() {
        let (_writer, router) = test_router(false);
        let (status, _) = get(router, "/test/dump?key=node_actors").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_writer, router) = test_router(true);
        let (status, body) = get(router.clone(), "/test/dump?key=node_actors").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["nodeActors"], serde_json::json!({}));

        let (status, body) = get(router, "/test/dump?key=everything").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "key");
    }
}
