mod health;
mod metrics;
mod services;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(services::routes())
        .nest("/metrics", metrics::routes())
}

/// Full application router; the dashboard reaches the same routes under `/api/admin`
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes())
        .nest("/api/admin", routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
