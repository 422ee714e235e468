#![allow(dead_code)]

use async_trait::async_trait;
use axum::{routing::get, Router};
use parking_lot::Mutex;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ualflix_admin::config::{BrokerConfig, ProbeConfig};
use ualflix_admin::db::{
    DatabaseStats, RawMember, RawReplicaSet, Sentinel, StoreManager, StoreResult, StoreRoute,
};
use ualflix_admin::error::MonitorError;
use ualflix_admin::models::ServiceDescriptor;
use ualflix_admin::services::{
    HealthProber, HostSampler, LagProbeSettings, MetricsStore, MonitorContext, ReplicaInspector,
    RollingHistory, ServiceDirectory,
};

/// Shared state behind the fake writer and reader routes
#[derive(Default)]
pub struct FakeStore {
    /// Sentinel ids with their write time
    pub sentinels: Mutex<HashMap<String, DateTime<Utc>>>,
    pub topology: Mutex<Option<RawReplicaSet>>,
    /// Whether writes become visible on the reader route
    pub replicating: AtomicBool,
    pub fail_writes: AtomicBool,
    pub writer_down: AtomicBool,
    pub reader_down: AtomicBool,
    pub inserts: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl FakeStore {
    pub fn replicating() -> Arc<Self> {
        let store = Arc::new(Self::default());
        store.replicating.store(true, Ordering::SeqCst);
        *store.topology.lock() = Some(healthy_topology());
        store
    }

    pub fn sentinel_count(&self) -> usize {
        self.sentinels.lock().len()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Route {
    Writer,
    Reader,
}

struct FakeRoute {
    store: Arc<FakeStore>,
    route: Route,
}

#[async_trait]
impl StoreRoute for FakeRoute {
    async fn ping(&self) -> StoreResult<()> {
        let down = match self.route {
            Route::Writer => self.store.writer_down.load(Ordering::SeqCst),
            Route::Reader => self.store.reader_down.load(Ordering::SeqCst),
        };
        if down {
            return Err(MonitorError::store("server selection timeout"));
        }
        Ok(())
    }

    async fn replica_set_status(&self) -> StoreResult<RawReplicaSet> {
        self.store
            .topology
            .lock()
            .clone()
            .ok_or_else(|| MonitorError::store("connection refused"))
    }

    async fn database_stats(&self) -> StoreResult<DatabaseStats> {
        Ok(DatabaseStats {
            data_size: 1024.0 * 1024.0,
            storage_size: 2.0 * 1024.0 * 1024.0,
            index_size: 0.0,
            collections: 3,
            objects: 12,
        })
    }

    async fn count_documents(&self, _collection: &str) -> StoreResult<u64> {
        Ok(4)
    }

    async fn insert_sentinel(&self, sentinel: &Sentinel) -> StoreResult<()> {
        if self.store.fail_writes.load(Ordering::SeqCst) {
            return Err(MonitorError::store("not primary"));
        }
        self.store.inserts.fetch_add(1, Ordering::SeqCst);
        self.store
            .sentinels
            .lock()
            .insert(sentinel.id.clone(), sentinel.written_at);
        Ok(())
    }

    async fn sentinel_exists(&self, sentinel_id: &str) -> StoreResult<bool> {
        let visible = self.route == Route::Writer || self.store.replicating.load(Ordering::SeqCst);
        Ok(visible && self.store.sentinels.lock().contains_key(sentinel_id))
    }

    async fn delete_sentinel(&self, sentinel_id: &str) -> StoreResult<()> {
        self.store.deletes.fetch_add(1, Ordering::SeqCst);
        self.store.sentinels.lock().remove(sentinel_id);
        Ok(())
    }

    async fn purge_sentinels(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut sentinels = self.store.sentinels.lock();
        let before = sentinels.len();
        sentinels.retain(|_, written_at| *written_at >= cutoff);
        Ok((before - sentinels.len()) as u64)
    }
}

pub fn store_manager(store: &Arc<FakeStore>, replica_set: Option<&str>) -> StoreManager {
    StoreManager::new(
        Arc::new(FakeRoute {
            store: store.clone(),
            route: Route::Writer,
        }),
        Arc::new(FakeRoute {
            store: store.clone(),
            route: Route::Reader,
        }),
        replica_set.map(str::to_string),
    )
}

pub fn healthy_topology() -> RawReplicaSet {
    RawReplicaSet {
        set_name: "ualflix-replica-set".to_string(),
        members: vec![
            RawMember {
                name: "ualflix_db_primary:27017".to_string(),
                state: 1,
                health: 1.0,
            },
            RawMember {
                name: "ualflix_db_secondary:27017".to_string(),
                state: 2,
                health: 1.0,
            },
        ],
    }
}

pub fn lag_settings(attempts: u32) -> LagProbeSettings {
    LagProbeSettings {
        attempts,
        interval: Duration::from_millis(5),
        healthy_below: Duration::from_secs(5),
    }
}

pub fn probe_config() -> ProbeConfig {
    ProbeConfig {
        timeout_ms: 1000,
        concurrency: 10,
        round_timeout_secs: 5,
    }
}

pub fn broker() -> BrokerConfig {
    BrokerConfig {
        username: "guest".to_string(),
        password: "guest".to_string(),
    }
}

pub fn monitor_context(entries: Vec<ServiceDescriptor>, store: StoreManager) -> MonitorContext {
    MonitorContext {
        directory: ServiceDirectory::new(entries),
        prober: HealthProber::new(&probe_config(), broker()).unwrap(),
        inspector: ReplicaInspector::new(store, lag_settings(10)),
        metrics: Arc::new(MetricsStore::new().unwrap()),
        history: Arc::new(RollingHistory::new(100)),
        host: Arc::new(HostSampler::new()),
    }
}

/// Serve `app` on an ephemeral port and return its base URL
pub async fn spawn_service(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub async fn healthy_service() -> String {
    spawn_service(Router::new().route("/health", get(|| async { "OK" }))).await
}

/// A port nothing listens on
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
