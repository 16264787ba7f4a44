//! Diagnostic dump of the aggregator's internal tables.
//!
//! Only mounted when the test module is enabled.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::error::ApiError;
use crate::api::response::RestResponse;
use crate::state::AppState;
use crate::view::ActorFilter;

pub fn routes() -> Router<AppState> {
    Router::new().route("/dump", get(dump))
}

#[derive(Debug, Deserialize)]
pub struct DumpQuery {
    pub key: Option<String>,
}

/// GET /test/dump?key=node_actors|actors|dead_actors|stats
async fn dump(
    State(state): State<AppState>,
    Query(query): Query<DumpQuery>,
) -> Result<Response, ApiError> {
    let key = query.key.unwrap_or_default();
    let view = state.view();

    let data = match key.as_str() {
        "node_actors" => json!({ "nodeActors": view.node_actors().await }),
        "actors" => json!({ "actors": view.list_actors(&ActorFilter::default()).await }),
        "dead_actors" => json!({ "deadActors": view.dead_actors().await }),
        "stats" => json!({ "stats": view.stats().await }),
        other => {
            return Err(ApiError::invalid_field(
                "key",
                format!("unknown dump key {other:?}, expected one of node_actors, actors, dead_actors, stats"),
            ))
        }
    };

    Ok(RestResponse::ok(format!("Fetched {key}."), data).into_response())
}
