// Metrics store - Prometheus instruments updated by the collectors
use parking_lot::Mutex;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts,
    Registry, TextEncoder,
};

use std::collections::HashMap;

use crate::error::MonitorError;

/// Endpoint label used for health probe latencies
pub const HEALTH_ENDPOINT: &str = "health";

/// Latest collector-produced figures for one service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceFigures {
    pub avg_latency_seconds: f64,
    pub latency_samples: u64,
    pub requests_total: u64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Instrument names and label dimensions are read by external dashboards
pub struct MetricsStore {
    registry: Registry,
    request_latency: HistogramVec,
    streaming_latency: Histogram,
    requests_total: IntCounterVec,
    data_bytes: IntCounterVec,
    cpu_percent: GaugeVec,
    memory_percent: GaugeVec,
    replica_status: GaugeVec,
    /// Role each member was last reported under
    member_roles: Mutex<HashMap<String, String>>,
    replication_lag: Gauge,
    availability: Gauge,
}

impl MetricsStore {
    pub fn new() -> Result<Self, MonitorError> {
        let store = Self {
            registry: Registry::new(),
            request_latency: HistogramVec::new(
                HistogramOpts::new(
                    "ualflix_system_request_duration_seconds",
                    "Request latency of platform services",
                ),
                &["service", "endpoint"],
            )?,
            streaming_latency: Histogram::with_opts(HistogramOpts::new(
                "ualflix_video_streaming_latency_seconds",
                "Video streaming latency",
            ))?,
            requests_total: IntCounterVec::new(
                Opts::new("ualflix_system_requests_total", "Total platform requests"),
                &["service", "method", "status"],
            )?,
            data_bytes: IntCounterVec::new(
                Opts::new("ualflix_data_bytes_total", "Total bytes transferred"),
                &["direction"],
            )?,
            cpu_percent: GaugeVec::new(
                Opts::new("ualflix_system_cpu_percent", "CPU usage per service"),
                &["service"],
            )?,
            memory_percent: GaugeVec::new(
                Opts::new("ualflix_system_memory_percent", "Memory usage per service"),
                &["service"],
            )?,
            replica_status: GaugeVec::new(
                Opts::new("ualflix_mongodb_replica_status", "Replica set member health"),
                &["member", "role"],
            )?,
            member_roles: Mutex::new(HashMap::new()),
            replication_lag: Gauge::new(
                "ualflix_mongodb_replication_lag_seconds",
                "Measured replication lag",
            )?,
            availability: Gauge::new(
                "ualflix_system_availability_percent",
                "Overall platform availability",
            )?,
        };

        store.registry.register(Box::new(store.request_latency.clone()))?;
        store.registry.register(Box::new(store.streaming_latency.clone()))?;
        store.registry.register(Box::new(store.requests_total.clone()))?;
        store.registry.register(Box::new(store.data_bytes.clone()))?;
        store.registry.register(Box::new(store.cpu_percent.clone()))?;
        store.registry.register(Box::new(store.memory_percent.clone()))?;
        store.registry.register(Box::new(store.replica_status.clone()))?;
        store.registry.register(Box::new(store.replication_lag.clone()))?;
        store.registry.register(Box::new(store.availability.clone()))?;

        Ok(store)
    }

    pub fn observe_latency(&self, service: &str, seconds: f64) {
        self.request_latency
            .with_label_values(&[service, HEALTH_ENDPOINT])
            .observe(seconds);
    }

    pub fn observe_streaming_latency(&self, seconds: f64) {
        self.streaming_latency.observe(seconds);
    }

    pub fn add_requests(&self, service: &str, method: &str, status: &str, count: u64) {
        self.requests_total
            .with_label_values(&[service, method, status])
            .inc_by(count);
    }

    pub fn add_data_bytes(&self, direction: &str, bytes: u64) {
        self.data_bytes.with_label_values(&[direction]).inc_by(bytes);
    }

    pub fn set_service_resources(&self, service: &str, cpu_percent: f64, memory_percent: f64) {
        self.cpu_percent.with_label_values(&[service]).set(cpu_percent);
        self.memory_percent
            .with_label_values(&[service])
            .set(memory_percent);
    }

    /// A member reported under a new role loses its series for the old one
    pub fn set_member_status(&self, member: &str, role: &str, healthy: bool) {
        let previous = self
            .member_roles
            .lock()
            .insert(member.to_string(), role.to_string());
        if let Some(previous) = previous.filter(|r| r != role) {
            let _ = self.replica_status.remove_label_values(&[member, previous.as_str()]);
        }
        self.replica_status
            .with_label_values(&[member, role])
            .set(if healthy { 1.0 } else { 0.0 });
    }

    pub fn set_replication_lag(&self, seconds: f64) {
        self.replication_lag.set(seconds);
    }

    pub fn set_availability(&self, percent: f64) {
        self.availability.set(percent);
    }

    pub fn availability(&self) -> f64 {
        self.availability.get()
    }

    pub fn replication_lag(&self) -> f64 {
        self.replication_lag.get()
    }

    /// Current value of a member series, without creating it
    pub fn member_status(&self, member: &str, role: &str) -> Option<f64> {
        self.replica_status
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .find(|metric| {
                let labels = metric.get_label();
                labels.iter().any(|l| l.get_name() == "member" && l.get_value() == member)
                    && labels.iter().any(|l| l.get_name() == "role" && l.get_value() == role)
            })
            .map(|metric| metric.get_gauge().get_value())
    }

    /// Figures for a service once the latency collector has observed it
    pub fn service_figures(&self, service: &str) -> Option<ServiceFigures> {
        let latency = self
            .request_latency
            .get_metric_with_label_values(&[service, HEALTH_ENDPOINT])
            .ok()?;
        let samples = latency.get_sample_count();
        if samples == 0 {
            return None;
        }

        let requests_total = self
            .requests_total
            .get_metric_with_label_values(&[service, "GET", "200"])
            .map(|c| c.get())
            .unwrap_or(0);

        Some(ServiceFigures {
            avg_latency_seconds: latency.get_sample_sum() / samples as f64,
            latency_samples: samples,
            requests_total,
            cpu_percent: self
                .cpu_percent
                .get_metric_with_label_values(&[service])
                .map(|g| g.get())
                .unwrap_or(0.0),
            memory_percent: self
                .memory_percent
                .get_metric_with_label_values(&[service])
                .map(|g| g.get())
                .unwrap_or(0.0),
        })
    }

    /// Text exposition of every instrument, with its content type
    pub fn encode(&self) -> Result<(String, Vec<u8>), MonitorError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}
