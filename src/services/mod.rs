mod aggregation;
mod collector;
mod directory;
mod history;
mod host;
mod inspector;
mod metrics_store;
mod prober;
pub mod synthetic;

use std::sync::Arc;

pub use aggregation::*;
pub use collector::*;
pub use directory::ServiceDirectory;
pub use history::RollingHistory;
pub use host::{HostSampler, HostSnapshot};
pub use inspector::{LagProbeSettings, ReplicaInspector, SINGLE_NODE_MEMBER, UNOBSERVED_LAG};
pub use metrics_store::{MetricsStore, ServiceFigures, HEALTH_ENDPOINT};
pub use prober::{HealthProber, ASSUMED_LATENCY, BROKER_OVERVIEW_PATH, HEALTH_PATHS};

/// Components shared by the collectors and the aggregation endpoints
#[derive(Clone)]
pub struct MonitorContext {
    pub directory: ServiceDirectory,
    pub prober: HealthProber,
    pub inspector: ReplicaInspector,
    pub metrics: Arc<MetricsStore>,
    pub history: Arc<RollingHistory>,
    pub host: Arc<HostSampler>,
}
