// Store connections - writer and reader routes to the replicated store
mod mongo;

pub use mongo::MongoRoute;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::options::{ClientOptions, ReadPreference, SelectionCriteria};
use mongodb::Client;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::MonitorError;

pub type StoreResult<T> = std::result::Result<T, MonitorError>;

/// Collection that holds transient replication sentinels
pub const SENTINEL_COLLECTION: &str = "replication_test";

/// Member entry as reported by the topology command
#[derive(Debug, Clone, PartialEq)]
pub struct RawMember {
    pub name: String,
    pub state: i32,
    pub health: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawReplicaSet {
    pub set_name: String,
    pub members: Vec<RawMember>,
}

/// Byte-level figures from the database statistics command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseStats {
    pub data_size: f64,
    pub storage_size: f64,
    pub index_size: f64,
    pub collections: u64,
    pub objects: u64,
}

/// Marker document written to measure replication lag
#[derive(Debug, Clone)]
pub struct Sentinel {
    pub id: String,
    pub written_at: DateTime<Utc>,
}

/// One logical route to the store.
///
/// The writer route prefers the primary; the reader route prefers
/// secondaries. Both talk to the same store and need no coordination.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreRoute: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    /// Run the replica-set topology status command
    async fn replica_set_status(&self) -> StoreResult<RawReplicaSet>;

    async fn database_stats(&self) -> StoreResult<DatabaseStats>;

    async fn count_documents(&self, collection: &str) -> StoreResult<u64>;

    async fn insert_sentinel(&self, sentinel: &Sentinel) -> StoreResult<()>;

    async fn sentinel_exists(&self, sentinel_id: &str) -> StoreResult<bool>;

    async fn delete_sentinel(&self, sentinel_id: &str) -> StoreResult<()>;

    /// Remove sentinels written before `cutoff`, returning how many went
    async fn purge_sentinels(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

/// One per process, built in `main`. Callers pick a route explicitly.
#[derive(Clone)]
pub struct StoreManager {
    writer: Arc<dyn StoreRoute>,
    reader: Arc<dyn StoreRoute>,
    replica_set: Option<String>,
    node_address: Option<String>,
}

impl StoreManager {
    pub fn new(
        writer: Arc<dyn StoreRoute>,
        reader: Arc<dyn StoreRoute>,
        replica_set: Option<String>,
    ) -> Self {
        Self {
            writer,
            reader,
            replica_set,
            node_address: None,
        }
    }

    /// Record the `host:port` of a single-node connection
    pub fn with_node_address(mut self, address: impl Into<String>) -> Self {
        self.node_address = Some(address.into());
        self
    }

    /// Connect to the replica set, falling back to a single-node connection
    /// when the replica set does not answer.
    pub async fn connect(config: &StoreConfig) -> anyhow::Result<Self> {
        let Some(set_name) = config.replica_set_name() else {
            tracing::info!("No replica set configured, using single-node connection");
            return Self::connect_single(config, &config.url).await;
        };

        match Self::connect_replica_set(config, set_name).await {
            Ok(manager) => Ok(manager),
            Err(e) => {
                tracing::warn!(
                    replica_set = %set_name,
                    error = %e,
                    "Replica set unreachable, falling back to single-node connection"
                );
                Self::connect_single(config, &config.fallback_url).await
            }
        }
    }

    async fn connect_replica_set(config: &StoreConfig, set_name: &str) -> anyhow::Result<Self> {
        tracing::info!(replica_set = %set_name, "Connecting to replica set");

        let mut base = ClientOptions::parse(&config.url).await?;
        base.server_selection_timeout = Some(config.server_selection_timeout());
        base.connect_timeout = Some(config.server_selection_timeout());
        base.repl_set_name = Some(set_name.to_string());
        base.retry_writes = Some(true);
        base.retry_reads = Some(true);

        let mut write_options = base.clone();
        write_options.selection_criteria =
            Some(SelectionCriteria::ReadPreference(ReadPreference::Primary));

        let mut read_options = base;
        read_options.selection_criteria = Some(SelectionCriteria::ReadPreference(
            ReadPreference::SecondaryPreferred {
                options: Default::default(),
            },
        ));

        let writer = MongoRoute::new(Client::with_options(write_options)?, &config.database, "primary");
        let reader = MongoRoute::new(Client::with_options(read_options)?, &config.database, "secondary");

        writer.ping().await?;
        reader.ping().await?;

        tracing::info!(replica_set = %set_name, "Replica set connections established");

        if let Err(e) = writer.ensure_sentinel_index().await {
            tracing::warn!(error = %e, "Could not index the replication sentinel collection");
        }

        Ok(Self::new(
            Arc::new(writer),
            Arc::new(reader),
            Some(set_name.to_string()),
        ))
    }

    async fn connect_single(config: &StoreConfig, url: &str) -> anyhow::Result<Self> {
        let mut options = ClientOptions::parse(url).await?;
        options.server_selection_timeout = Some(config.server_selection_timeout());
        // A replicaSet parameter in the URI would make the driver wait for a set
        options.repl_set_name = None;
        options.direct_connection = Some(true);
        let address = options.hosts.first().map(ToString::to_string);

        let client = Client::with_options(options)?;
        let route = Arc::new(MongoRoute::new(client, &config.database, "standalone"));

        if let Err(e) = route.ping().await {
            // Keep serving: /health reports the store as unreachable until it recovers
            tracing::error!(error = %e, "Single-node store connection is not answering");
        } else {
            tracing::warn!("Connected to store in single-node mode");
            if let Err(e) = route.ensure_sentinel_index().await {
                tracing::warn!(error = %e, "Could not index the replication sentinel collection");
            }
        }

        let manager = Self::new(route.clone(), route, None);
        Ok(match address {
            Some(address) => manager.with_node_address(address),
            None => manager,
        })
    }

    /// Route that prefers the primary
    pub fn writer(&self) -> &dyn StoreRoute {
        self.writer.as_ref()
    }

    /// Route that prefers secondaries
    pub fn reader(&self) -> &dyn StoreRoute {
        self.reader.as_ref()
    }

    pub fn writer_handle(&self) -> Arc<dyn StoreRoute> {
        Arc::clone(&self.writer)
    }

    pub fn replica_set(&self) -> Option<&str> {
        self.replica_set.as_deref()
    }

    /// Address of the node behind a single-node connection
    pub fn node_address(&self) -> Option<&str> {
        self.node_address.as_deref()
    }

    pub fn is_single_node(&self) -> bool {
        self.replica_set.is_none()
    }
}
