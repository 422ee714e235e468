// Aggregation service - point-in-time snapshots served by the HTTP layer
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::synthetic::{self, ClusterInfo, FallbackFigures};
use super::{HostSnapshot, MonitorContext};
use crate::error::MonitorError;
use crate::models::{
    Alert, AlertSeverity, HealthResult, HealthStatus, MemberRole, MetricSample, ProbeMethod,
    ReplicaSetHealth, ReplicaSetStatus, ReplicationLagSample, RouteReport, ServiceDescriptor,
    ServiceKind, StoreMetrics,
};
use crate::utils::{format_datetime, round_to};

/// Availability below this percentage raises a warning
pub const AVAILABILITY_WARNING_THRESHOLD: f64 = 90.0;

/// Share of healthy services as a percentage; an empty round is 0
pub fn availability_percent(healthy: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * healthy as f64 / total as f64
}

/// Threshold rules evaluated fresh for every summary
pub fn alerts_for(topology: &ReplicaSetStatus, availability: f64) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if topology.overall != ReplicaSetHealth::Healthy {
        let mut message = format!(
            "Replica set {} is {}",
            topology.set_name,
            topology.overall.as_str()
        );
        if let Some(detail) = &topology.detail {
            message.push_str(": ");
            message.push_str(detail);
        }
        alerts.push(Alert::new(AlertSeverity::Critical, "replica_set", message));
    }

    if availability < AVAILABILITY_WARNING_THRESHOLD {
        alerts.push(Alert::new(
            AlertSeverity::Warning,
            "availability",
            format!("Service availability at {:.1}%", availability),
        ));
    }

    alerts
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectorFigures {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub requests_total: u64,
    pub avg_response_ms: f64,
    pub source: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServiceMetrics {
    Collector(CollectorFigures),
    Synthetic(FallbackFigures),
    Store(RouteReport),
}

impl ServiceMetrics {
    pub fn source(&self) -> &'static str {
        match self {
            ServiceMetrics::Collector(_) => "collector",
            ServiceMetrics::Synthetic(_) => "synthetic",
            ServiceMetrics::Store(_) => "store",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplicaSetInfo {
    pub role: MemberRole,
    pub replica_set_name: String,
    pub members_count: usize,
    pub status: ReplicaSetHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceEntry {
    pub id: String,
    pub name: String,
    pub kind: ServiceKind,
    pub instance: String,
    pub url: String,
    pub status: HealthStatus,
    pub response_time_ms: f64,
    pub http_status: Option<u16>,
    pub probed_via: ProbeMethod,
    pub detail: Option<String>,
    pub last_check: String,
    pub metrics: ServiceMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica_set_info: Option<ReplicaSetInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_info: Option<ClusterInfo>,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServicesReport {
    pub services: Vec<ServiceEntry>,
    pub total: usize,
    pub healthy: usize,
    pub availability_percent: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceCounts {
    pub total: usize,
    pub healthy: usize,
    pub availability_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub topology: ReplicaSetStatus,
    pub metrics: StoreMetrics,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrendSummary {
    pub data_points: usize,
    pub avg_availability_percent: f64,
    pub avg_cpu_percent: f64,
    pub avg_memory_percent: f64,
    pub latest: Option<MetricSample>,
}

impl TrendSummary {
    pub fn from_samples(samples: &[MetricSample]) -> Self {
        let Some(latest) = samples.last() else {
            return Self::default();
        };
        Self {
            data_points: samples.len(),
            avg_availability_percent: mean(samples, |s| s.availability_percent),
            avg_cpu_percent: mean(samples, |s| s.cpu_percent),
            avg_memory_percent: mean(samples, |s| s.memory_percent),
            latest: Some(latest.clone()),
        }
    }
}

fn mean(samples: &[MetricSample], field: impl Fn(&MetricSample) -> f64) -> f64 {
    let total: f64 = samples.iter().map(field).sum();
    round_to(total / samples.len() as f64, 2)
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub timestamp: DateTime<Utc>,
    pub system: HostSnapshot,
    pub services: ServiceCounts,
    pub store: StoreSummary,
    pub alerts: Vec<Alert>,
    pub trend: TrendSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStatusReport {
    pub single_node: bool,
    pub topology: ReplicaSetStatus,
    pub metrics: StoreMetrics,
    pub replication: ReplicationLagSample,
    pub timestamp: DateTime<Utc>,
}

/// Each snapshot runs its own probe round; collector output is only read
#[derive(Clone)]
pub struct AggregationService {
    ctx: MonitorContext,
}

impl AggregationService {
    pub fn new(ctx: MonitorContext) -> Self {
        Self { ctx }
    }

    /// One entry per directory service, in directory order
    pub async fn services_status(&self) -> ServicesReport {
        let (results, topology, store) = tokio::join!(
            self.ctx.prober.probe_round(self.ctx.directory.list()),
            self.ctx.inspector.get_topology(),
            self.ctx.inspector.get_metrics(),
        );

        let now = Utc::now();
        let healthy = results.iter().filter(|(_, r)| r.is_healthy()).count();
        let total = results.len();

        let services = results
            .into_iter()
            .map(|(descriptor, result)| self.entry(descriptor, result, &topology, &store, now))
            .collect();

        ServicesReport {
            services,
            total,
            healthy,
            availability_percent: availability_percent(healthy, total),
            timestamp: now,
        }
    }

    fn entry(
        &self,
        descriptor: ServiceDescriptor,
        result: HealthResult,
        topology: &ReplicaSetStatus,
        store: &StoreMetrics,
        now: DateTime<Utc>,
    ) -> ServiceEntry {
        let (metrics, replica_set_info) = if descriptor.kind == ServiceKind::DataStoreNode {
            let role = topology
                .member_for_host(descriptor.host())
                .map(|m| m.role)
                .unwrap_or(MemberRole::Unknown);
            let report = match role {
                MemberRole::Primary => store.primary.clone(),
                _ => store.secondary.clone(),
            };
            let info = ReplicaSetInfo {
                role,
                replica_set_name: topology.set_name.clone(),
                members_count: topology.members.len(),
                status: topology.overall,
            };
            (ServiceMetrics::Store(report), Some(info))
        } else {
            (self.service_metrics(&descriptor.name), None)
        };

        let cluster_info = descriptor
            .name
            .contains("service")
            .then(|| synthetic::cluster_info(&descriptor.name));

        let mut logs = vec![format!(
            "{} INFO health check via {}: {}",
            format_datetime(now),
            descriptor.instance(),
            result.status.as_str()
        )];
        if let Some(detail) = &result.detail {
            logs.push(format!("{} WARN {}", format_datetime(now), detail));
        }

        ServiceEntry {
            id: descriptor.name.clone(),
            name: descriptor.display_name(),
            kind: descriptor.kind,
            instance: descriptor.instance().to_string(),
            url: descriptor.base_url.clone(),
            status: result.status,
            response_time_ms: round_to(result.latency.as_secs_f64() * 1000.0, 2),
            http_status: result.http_status,
            probed_via: result.probed_via,
            detail: result.detail,
            last_check: format_datetime(now),
            metrics,
            replica_set_info,
            cluster_info,
            logs,
        }
    }

    fn service_metrics(&self, service: &str) -> ServiceMetrics {
        match self.ctx.metrics.service_figures(service) {
            Some(figures) => ServiceMetrics::Collector(CollectorFigures {
                cpu_percent: round_to(figures.cpu_percent, 1),
                memory_percent: round_to(figures.memory_percent, 1),
                requests_total: figures.requests_total,
                avg_response_ms: round_to(figures.avg_latency_seconds * 1000.0, 2),
                source: "collector",
            }),
            None => ServiceMetrics::Synthetic(synthetic::fallback_figures(service)),
        }
    }

    pub async fn metrics_summary(&self) -> MetricsSummary {
        let (results, host, topology, store) = tokio::join!(
            self.ctx.prober.probe_round(self.ctx.directory.list()),
            self.ctx.host.sample(),
            self.ctx.inspector.get_topology(),
            self.ctx.inspector.get_metrics(),
        );

        let healthy = results.iter().filter(|(_, r)| r.is_healthy()).count();
        let availability = availability_percent(healthy, results.len());
        let alerts = alerts_for(&topology, availability);

        MetricsSummary {
            timestamp: Utc::now(),
            system: host,
            services: ServiceCounts {
                total: results.len(),
                healthy,
                availability_percent: availability,
            },
            store: StoreSummary {
                topology,
                metrics: store,
            },
            alerts,
            trend: TrendSummary::from_samples(&self.ctx.history.snapshot()),
        }
    }

    /// Fails only when the writer route does not answer at all
    pub async fn store_status(&self) -> Result<StoreStatusReport, MonitorError> {
        self.ctx.inspector.ping_writer().await?;

        let (topology, metrics, replication) = tokio::join!(
            self.ctx.inspector.get_topology(),
            self.ctx.inspector.get_metrics(),
            self.ctx.inspector.measure_lag(),
        );

        Ok(StoreStatusReport {
            single_node: self.ctx.inspector.store().is_single_node(),
            topology,
            metrics,
            replication,
            timestamp: Utc::now(),
        })
    }
}
