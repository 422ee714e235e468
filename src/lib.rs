pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::services::{AggregationService, MetricsStore, ReplicaInspector, Supervisor};

#[derive(Clone)]
pub struct AppState {
    pub aggregation: AggregationService,
    pub inspector: ReplicaInspector,
    pub metrics: Arc<MetricsStore>,
    pub supervisor: Arc<Supervisor>,
}
