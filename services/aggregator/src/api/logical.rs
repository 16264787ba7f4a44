//! Logical actor queries.

use std::collections::BTreeMap;

use actorlens_events::ActorState;
use actorlens_id::{ActorId, JobId, NodeId};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::response::RestResponse;
use crate::state::AppState;
use crate::view::{ActorFilter, ActorRecord};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/actors", get(list_actors))
        .route("/actors/{actor_id}", get(get_actor))
}

/// Query parameters for listing actors. All filters are optional.
#[derive(Debug, Default, Deserialize)]
pub struct ListActorsQuery {
    pub job_id: Option<String>,
    pub state: Option<String>,
    pub node_id: Option<String>,
}

impl ListActorsQuery {
    fn into_filter(self) -> Result<ActorFilter, ApiError> {
        let job_id = non_empty(self.job_id)
            .map(|raw| JobId::parse(&raw))
            .transpose()
            .map_err(|e| ApiError::invalid_field("job_id", e.to_string()))?;

        let state = non_empty(self.state)
            .map(|raw| raw.to_ascii_uppercase().parse::<ActorState>())
            .transpose()
            .map_err(|e| ApiError::invalid_field("state", e.to_string()))?;

        let node_id = non_empty(self.node_id)
            .map(|raw| NodeId::parse(&raw))
            .transpose()
            .map_err(|e| ApiError::invalid_field("node_id", e.to_string()))?;

        Ok(ActorFilter {
            job_id,
            state,
            node_id,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Serialize)]
struct ActorsData {
    actors: BTreeMap<ActorId, ActorRecord>,
}

#[derive(Debug, Serialize)]
struct ActorData {
    actor: ActorRecord,
}

/// List actors in the aggregated view.
///
/// GET /logical/actors
async fn list_actors(
    State(state): State<AppState>,
    Query(query): Query<ListActorsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.into_filter()?;
    let actors = state.view().list_actors(&filter).await;

    tracing::debug!(count = actors.len(), filtered = !filter.is_empty(), "Listed actors");
    Ok(RestResponse::ok("All actors fetched.", ActorsData { actors }))
}

/// Get a single actor by ID.
///
/// GET /logical/actors/{actor_id}
async fn get_actor(
    State(state): State<AppState>,
    Path(actor_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor_id = ActorId::parse(&actor_id)
        .map_err(|e| ApiError::bad_request("invalid_actor_id", e.to_string()))?;

    match state.view().get_actor(&actor_id).await {
        Some(actor) => Ok(RestResponse::ok("Actor fetched.", ActorData { actor })),
        None => Err(ApiError::not_found(
            "actor_not_found",
            format!("Actor {actor_id} not found"),
        )),
    }
}
