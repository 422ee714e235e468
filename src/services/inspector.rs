// Replica inspector - topology, store statistics and replication lag
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ReplicationConfig;
use crate::db::{RawReplicaSet, Sentinel, StoreManager, StoreResult, StoreRoute};
use crate::error::MonitorError;
use crate::models::{
    LagStatus, MemberRole, ReplicaMember, ReplicaSetHealth, ReplicaSetStatus,
    ReplicationLagSample, RouteReport, RouteStats, StoreMetrics,
};
use crate::utils::round_to;

/// Lag reported when the sentinel was never observed on the read path
pub const UNOBSERVED_LAG: Duration = Duration::from_secs(999);

/// Set name reported for a single-node store, and its member name when the
/// node address is not known
pub const SINGLE_NODE_MEMBER: &str = "standalone";

/// Sentinels older than this belong to measurements that never cleaned up
pub const STALE_SENTINEL_AGE: Duration = Duration::from_secs(60);

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone)]
pub struct LagProbeSettings {
    pub attempts: u32,
    pub interval: Duration,
    pub healthy_below: Duration,
}

impl From<&ReplicationConfig> for LagProbeSettings {
    fn from(config: &ReplicationConfig) -> Self {
        Self {
            attempts: config.lag_attempts.max(1),
            interval: Duration::from_millis(config.lag_interval_ms),
            healthy_below: Duration::from_secs_f64(config.lag_threshold_secs),
        }
    }
}

impl Default for LagProbeSettings {
    fn default() -> Self {
        Self::from(&ReplicationConfig::default())
    }
}

/// Store failures are carried inside each result rather than returned
#[derive(Clone)]
pub struct ReplicaInspector {
    store: StoreManager,
    settings: LagProbeSettings,
}

impl ReplicaInspector {
    pub fn new(store: StoreManager, settings: LagProbeSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &StoreManager {
        &self.store
    }

    pub async fn ping_writer(&self) -> StoreResult<()> {
        self.store.writer().ping().await
    }

    pub async fn ping_reader(&self) -> StoreResult<()> {
        self.store.reader().ping().await
    }

    /// Membership and role assignment of the replica set.
    ///
    /// A single-node store never receives the replica-set command.
    pub async fn get_topology(&self) -> ReplicaSetStatus {
        let Some(set_name) = self.store.replica_set() else {
            return single_node_status(self.store.node_address());
        };

        match self.store.writer().replica_set_status().await {
            Ok(raw) => classify(raw),
            Err(e) => {
                warn!(replica_set = %set_name, error = %e, "Topology command failed");
                ReplicaSetStatus {
                    set_name: set_name.to_string(),
                    overall: ReplicaSetHealth::Error,
                    primary_member: None,
                    members: Vec::new(),
                    detail: Some(e.to_string()),
                }
            }
        }
    }

    /// Write a sentinel through the writer and time its arrival on the reader
    pub async fn measure_lag(&self) -> ReplicationLagSample {
        self.purge_stale_sentinels().await;

        let sentinel = Sentinel {
            id: format!("replication_test_{}", Uuid::new_v4().simple()),
            written_at: Utc::now(),
        };
        let started = Instant::now();

        if let Err(e) = self.store.writer().insert_sentinel(&sentinel).await {
            warn!(sentinel_id = %sentinel.id, error = %e, "Sentinel write failed");
            // The write may have been applied even though it reported failure
            if let Err(cleanup) = self.store.writer().delete_sentinel(&sentinel.id).await {
                warn!(sentinel_id = %sentinel.id, error = %cleanup, "Sentinel cleanup failed");
            }
            return ReplicationLagSample {
                sentinel_id: sentinel.id,
                working: false,
                lag: UNOBSERVED_LAG,
                attempts: 1,
                status: LagStatus::Failed,
                detail: Some(e.to_string()),
            };
        }

        // Armed after the insert returns; sentinels abandoned mid-insert are purged later
        let guard = SentinelGuard::new(self.store.writer_handle(), sentinel.id.clone());

        let max_attempts = self.settings.attempts.max(1);
        let mut attempts = 0;
        let mut observed = None;

        for attempt in 1..=max_attempts {
            attempts = attempt;
            match self.store.reader().sentinel_exists(&sentinel.id).await {
                Ok(true) => {
                    observed = Some(started.elapsed());
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(sentinel_id = %sentinel.id, attempt, error = %e, "Sentinel read-back failed");
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.settings.interval).await;
            }
        }

        guard.release().await;

        match observed {
            Some(lag) => {
                debug!(sentinel_id = %sentinel.id, lag_secs = lag.as_secs_f64(), attempts, "Replication observed");
                let status = if lag < self.settings.healthy_below {
                    LagStatus::Healthy
                } else {
                    LagStatus::Warning
                };
                ReplicationLagSample {
                    sentinel_id: sentinel.id,
                    working: true,
                    lag,
                    attempts,
                    status,
                    detail: None,
                }
            }
            None => {
                let e = MonitorError::ReplicationUnconfirmed { attempts };
                info!(sentinel_id = %sentinel.id, "{}", e);
                ReplicationLagSample {
                    sentinel_id: sentinel.id,
                    working: false,
                    lag: UNOBSERVED_LAG,
                    attempts,
                    status: LagStatus::Failed,
                    detail: Some(e.to_string()),
                }
            }
        }
    }

    async fn purge_stale_sentinels(&self) {
        let Ok(age) = chrono::Duration::from_std(STALE_SENTINEL_AGE) else {
            return;
        };
        match self.store.writer().purge_sentinels(Utc::now() - age).await {
            Ok(0) => {}
            Ok(purged) => info!(purged, "Removed stale replication sentinels"),
            Err(e) => debug!(error = %e, "Stale sentinel purge failed"),
        }
    }

    /// Database statistics through both routes
    pub async fn get_metrics(&self) -> StoreMetrics {
        let (primary, secondary) = tokio::join!(
            route_report(self.store.writer()),
            route_report(self.store.reader())
        );

        StoreMetrics {
            primary,
            secondary,
            replica_set_name: self.store.replica_set().map(str::to_string),
            collected_at: Utc::now(),
        }
    }
}

/// The one node serves every route, so it is reported as the primary
fn single_node_status(node_address: Option<&str>) -> ReplicaSetStatus {
    let name = node_address.unwrap_or(SINGLE_NODE_MEMBER).to_string();
    ReplicaSetStatus {
        set_name: SINGLE_NODE_MEMBER.to_string(),
        overall: ReplicaSetHealth::SingleNode,
        primary_member: Some(name.clone()),
        members: vec![ReplicaMember {
            name,
            role: MemberRole::Primary,
            healthy: true,
        }],
        detail: None,
    }
}

/// Healthy means exactly one primary and every member reporting health 1
fn classify(raw: RawReplicaSet) -> ReplicaSetStatus {
    let members: Vec<ReplicaMember> = raw
        .members
        .into_iter()
        .map(|m| ReplicaMember {
            role: MemberRole::from_state_code(m.state),
            healthy: m.health == 1.0,
            name: m.name,
        })
        .collect();

    let primaries: Vec<&ReplicaMember> = members
        .iter()
        .filter(|m| m.role == MemberRole::Primary)
        .collect();
    let primary_member = primaries.first().map(|m| m.name.clone());

    let overall = if primaries.len() == 1 && members.iter().all(|m| m.healthy) {
        ReplicaSetHealth::Healthy
    } else {
        ReplicaSetHealth::Degraded
    };

    ReplicaSetStatus {
        set_name: raw.set_name,
        overall,
        primary_member,
        members,
        detail: None,
    }
}

async fn route_report(route: &dyn StoreRoute) -> RouteReport {
    let stats = match route.database_stats().await {
        Ok(stats) => stats,
        Err(e) => {
            return RouteReport::Unavailable {
                error: e.to_string(),
            }
        }
    };

    let (users, videos, views) = tokio::join!(
        route.count_documents("users"),
        route.count_documents("videos"),
        route.count_documents("video_views"),
    );

    RouteReport::Available(RouteStats {
        data_size_mb: round_to(stats.data_size / BYTES_PER_MB, 2),
        storage_size_mb: round_to(stats.storage_size / BYTES_PER_MB, 2),
        index_size_mb: round_to(stats.index_size / BYTES_PER_MB, 2),
        collections: stats.collections,
        objects: stats.objects,
        users_count: users.unwrap_or(0),
        videos_count: videos.unwrap_or(0),
        views_count: views.unwrap_or(0),
    })
}

/// Deletes an inserted sentinel when released, or from a spawned task if
/// the measurement is dropped before reaching `release`.
struct SentinelGuard {
    route: Arc<dyn StoreRoute>,
    sentinel_id: Option<String>,
}

impl SentinelGuard {
    fn new(route: Arc<dyn StoreRoute>, sentinel_id: String) -> Self {
        Self {
            route,
            sentinel_id: Some(sentinel_id),
        }
    }

    async fn release(mut self) {
        if let Some(id) = self.sentinel_id.take() {
            if let Err(e) = self.route.delete_sentinel(&id).await {
                warn!(sentinel_id = %id, error = %e, "Sentinel cleanup failed");
            }
        }
    }
}

impl Drop for SentinelGuard {
    fn drop(&mut self) {
        let Some(id) = self.sentinel_id.take() else {
            return;
        };
        let route = Arc::clone(&self.route);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = route.delete_sentinel(&id).await {
                    warn!(sentinel_id = %id, error = %e, "Deferred sentinel cleanup failed");
                }
            });
        }
    }
}
