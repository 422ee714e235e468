use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::Result;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica_set: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub database: DatabaseHealth,
    pub collectors_running: bool,
    pub data_points: usize,
}

async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    state.inspector.ping_reader().await?;

    let store = state.inspector.store();
    Ok(Json(HealthResponse {
        status: "healthy",
        service: "ualflix-admin",
        database: DatabaseHealth {
            connected: true,
            mode: if store.is_single_node() {
                "single_node"
            } else {
                "replica_set"
            },
            replica_set: store.replica_set().map(str::to_string),
        },
        collectors_running: state.supervisor.is_running(),
        data_points: state.supervisor.history().len(),
    }))
}
