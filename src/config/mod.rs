use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub broker: BrokerConfig,
    pub services: ServicesConfig,
    pub probe: ProbeConfig,
    pub collector: CollectorConfig,
    pub replication: ReplicationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub url: String,
    /// Single-node URI used when the replica set cannot be reached
    pub fallback_url: String,
    pub database: String,
    /// Replica set name; empty means the store runs as a single node
    #[serde(default)]
    pub replica_set: String,
    #[serde(default = "default_selection_timeout")]
    pub server_selection_timeout_secs: u64,
}

impl StoreConfig {
    pub fn replica_set_name(&self) -> Option<&str> {
        let name = self.replica_set.trim();
        (!name.is_empty()).then_some(name)
    }

    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_secs(self.server_selection_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub username: String,
    pub password: String,
}

/// Base URLs of the services the admin component watches
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    pub authentication_service: String,
    pub catalog_service: String,
    pub streaming_service: String,
    pub video_processor: String,
    pub queue_service: String,
    pub ualflix_db_primary: String,
    pub ualflix_db_secondary: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_probe_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_round_timeout_secs")]
    pub round_timeout_secs: u64,
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn round_timeout(&self) -> Duration {
        Duration::from_secs(self.round_timeout_secs)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout_ms(),
            concurrency: default_probe_concurrency(),
            round_timeout_secs: default_round_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    pub latency_interval_secs: u64,
    pub throughput_interval_secs: u64,
    pub resource_interval_secs: u64,
    pub replication_interval_secs: u64,
    pub trend_interval_secs: u64,
    /// Fraction of the cadence slept after a failed cycle
    pub recovery_ratio: f64,
    pub history_capacity: usize,
    /// Directory entry that also feeds the streaming latency histogram
    pub streaming_service: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            latency_interval_secs: 15,
            throughput_interval_secs: 20,
            resource_interval_secs: 30,
            replication_interval_secs: 45,
            trend_interval_secs: 60,
            recovery_ratio: 2.0 / 3.0,
            history_capacity: 100,
            streaming_service: "streaming_service".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplicationConfig {
    pub lag_attempts: u32,
    pub lag_interval_ms: u64,
    pub lag_threshold_secs: f64,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            lag_attempts: 10,
            lag_interval_ms: 500,
            lag_threshold_secs: 5.0,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8002
}

fn default_selection_timeout() -> u64 {
    15
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_probe_concurrency() -> usize {
    10
}

fn default_round_timeout_secs() -> u64 {
    10
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8002)?
            .set_default(
                "store.url",
                "mongodb://ualflix_db_primary:27017,ualflix_db_secondary:27017,ualflix_db_arbiter:27017/ualflix?replicaSet=ualflix-replica-set",
            )?
            .set_default("store.fallback_url", "mongodb://ualflix_db_primary:27017/ualflix")?
            .set_default("store.database", "ualflix")?
            .set_default("store.replica_set", "ualflix-replica-set")?
            .set_default("store.server_selection_timeout_secs", 15)?
            .set_default("broker.username", "ualflix")?
            .set_default("broker.password", "ualflix_password")?
            .set_default("services.authentication_service", "http://authentication_service:8000")?
            .set_default("services.catalog_service", "http://catalog_service:8000")?
            .set_default("services.streaming_service", "http://streaming_service:8001")?
            .set_default("services.video_processor", "http://video_processor:8000")?
            .set_default("services.queue_service", "http://queue_service:15672")?
            .set_default("services.ualflix_db_primary", "http://ualflix_db_primary:27017")?
            .set_default("services.ualflix_db_secondary", "http://ualflix_db_secondary:27018")?
            .set_default("probe.timeout_ms", 2000)?
            .set_default("probe.concurrency", 10)?
            .set_default("probe.round_timeout_secs", 10)?
            .set_default("collector.latency_interval_secs", 15)?
            .set_default("collector.throughput_interval_secs", 20)?
            .set_default("collector.resource_interval_secs", 30)?
            .set_default("collector.replication_interval_secs", 45)?
            .set_default("collector.trend_interval_secs", 60)?
            .set_default("collector.recovery_ratio", 2.0 / 3.0)?
            .set_default("collector.history_capacity", 100)?
            .set_default("collector.streaming_service", "streaming_service")?
            .set_default("replication.lag_attempts", 10)?
            .set_default("replication.lag_interval_ms", 500)?
            .set_default("replication.lag_threshold_secs", 5.0)?
            .add_source(config::Environment::default().separator("__"))
            // Names used by the rest of the platform's compose files
            .set_override_option("store.url", std::env::var("MONGODB_CONNECTION_STRING").ok())?
            .set_override_option("store.database", std::env::var("MONGODB_DATABASE").ok())?
            .set_override_option("store.replica_set", std::env::var("MONGODB_REPLICA_SET").ok())?
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
