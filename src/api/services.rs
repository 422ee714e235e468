use axum::{extract::State, routing::get, Json, Router};

use crate::services::ServicesReport;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/services", get(list_services))
}

async fn list_services(State(state): State<AppState>) -> Json<ServicesReport> {
    Json(state.aggregation.services_status().await)
}
