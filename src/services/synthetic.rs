// Synthetic figures - deterministic stand-ins for what services do not export
use serde::Serialize;

use crate::utils::stable_hash;

/// Bytes attributed to each service per throughput cycle
pub const BYTES_IN_PER_SERVICE: u64 = 5 * 1024;
pub const BYTES_OUT_PER_SERVICE: u64 = 5 * 800;

/// Requests attributed to a service in one throughput cycle, in `1..=10`
pub fn request_increment(service: &str, epoch_secs: i64) -> u64 {
    1 + stable_hash(&format!("{service}{epoch_secs}")) % 10
}

/// Share of host usage attributed to the `index`-th of `count` services
pub fn resource_share(
    service: &str,
    index: usize,
    count: usize,
    host_cpu: f64,
    host_memory: f64,
) -> (f64, f64) {
    let n = count.max(1) as f64;
    let h = stable_hash(service);
    let cpu = host_cpu / n + (2 * index) as f64 + (h % 10) as f64;
    let memory = host_memory / n + (3 * index) as f64 + (h % 15) as f64;
    (cpu.min(100.0), memory.min(100.0))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackFigures {
    pub cpu_percent: f64,
    pub memory_mb: u64,
    pub request_rate: u64,
    pub avg_response_ms: u64,
    pub uptime: String,
    pub source: &'static str,
}

/// Per-service figures used before the collectors have observed a service
pub fn fallback_figures(service: &str) -> FallbackFigures {
    let h = stable_hash(service);
    FallbackFigures {
        cpu_percent: (5 + h % 15) as f64,
        memory_mb: 50 + h % 100,
        request_rate: 1 + h % 5,
        avg_response_ms: 50 + h % 100,
        uptime: format!("{}h {}m", h % 72, h % 60),
        source: "synthetic",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterInfo {
    pub replicas: u64,
    pub load_balancer: &'static str,
    pub source: &'static str,
}

pub fn cluster_info(service: &str) -> ClusterInfo {
    ClusterInfo {
        replicas: 2 + stable_hash(service) % 2,
        load_balancer: "nginx",
        source: "synthetic",
    }
}
