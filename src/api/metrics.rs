use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::error::Result;
use crate::services::{MetricsSummary, StoreStatusReport};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(prometheus_exposition))
        .route("/summary", get(get_summary))
        .route("/store-status", get(get_store_status))
}

async fn get_summary(State(state): State<AppState>) -> Json<MetricsSummary> {
    Json(state.aggregation.metrics_summary().await)
}

async fn get_store_status(State(state): State<AppState>) -> Result<Json<StoreStatusReport>> {
    let report = state.aggregation.store_status().await?;
    Ok(Json(report))
}

async fn prometheus_exposition(State(state): State<AppState>) -> Result<Response> {
    let (content_type, buffer) = state.metrics.encode()?;
    Ok(([(header::CONTENT_TYPE, content_type)], buffer).into_response())
}
