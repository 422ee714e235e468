// Health prober - kind-specific liveness probes against directory entries
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::{BrokerConfig, ProbeConfig};
use crate::error::MonitorError;
use crate::models::{HealthResult, HealthStatus, ProbeMethod, ServiceDescriptor, ServiceKind};

/// Candidate paths tried in order for microservices and processors
pub const HEALTH_PATHS: [&str; 3] = ["/health", "/api/health", "/"];

/// Management endpoint of the message broker
pub const BROKER_OVERVIEW_PATH: &str = "/api/overview";

/// Latency reported for data-store nodes, which are never contacted
pub const ASSUMED_LATENCY: Duration = Duration::from_millis(10);

/// Every outcome, including an unreachable service or a malformed base URL,
/// is folded into a [`HealthResult`].
#[derive(Clone)]
pub struct HealthProber {
    client: reqwest::Client,
    timeout: Duration,
    concurrency: usize,
    round_timeout: Duration,
    broker: BrokerConfig,
}

impl HealthProber {
    pub fn new(probe: &ProbeConfig, broker: BrokerConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(probe.timeout())
            .build()?;

        Ok(Self {
            client,
            timeout: probe.timeout(),
            concurrency: probe.concurrency.max(1),
            round_timeout: probe.round_timeout(),
            broker,
        })
    }

    /// Probe a single directory entry
    pub async fn probe(&self, descriptor: &ServiceDescriptor) -> HealthResult {
        match descriptor.kind {
            // Presence in the directory means the orchestrator provisioned it;
            // store nodes expose no HTTP surface to probe.
            ServiceKind::DataStoreNode => HealthResult {
                status: HealthStatus::Healthy,
                latency: ASSUMED_LATENCY,
                detail: None,
                probed_via: ProbeMethod::AssumedHealthy,
                http_status: None,
            },
            ServiceKind::Messaging => {
                self.http_probe(descriptor, &[BROKER_OVERVIEW_PATH], true)
                    .await
            }
            ServiceKind::Microservice | ServiceKind::Processor => {
                self.http_probe(descriptor, &HEALTH_PATHS, false).await
            }
        }
    }

    async fn http_probe(
        &self,
        descriptor: &ServiceDescriptor,
        paths: &[&str],
        authenticated: bool,
    ) -> HealthResult {
        let started = Instant::now();
        let mut last_status: Option<StatusCode> = None;
        let mut last_error: Option<MonitorError> = None;

        for path in paths {
            let url = format!("{}{}", descriptor.base_url, path);
            let mut request = self.client.get(&url).timeout(self.timeout);
            if authenticated {
                request = request.basic_auth(&self.broker.username, Some(&self.broker.password));
            }

            match request.send().await {
                Ok(response) if response.status() == StatusCode::OK => {
                    return HealthResult {
                        status: HealthStatus::Healthy,
                        latency: started.elapsed(),
                        detail: None,
                        probed_via: ProbeMethod::HttpProbe,
                        http_status: Some(StatusCode::OK.as_u16()),
                    };
                }
                Ok(response) => {
                    debug!(
                        service = %descriptor.name,
                        url = %url,
                        status = response.status().as_u16(),
                        "Probe candidate answered without success"
                    );
                    last_status = Some(response.status());
                }
                Err(e) if e.is_builder() => {
                    warn!(service = %descriptor.name, error = %e, "Malformed probe URL");
                    return HealthResult {
                        status: HealthStatus::Error,
                        latency: started.elapsed(),
                        detail: Some(e.to_string()),
                        probed_via: ProbeMethod::HttpProbe,
                        http_status: None,
                    };
                }
                Err(e) => {
                    debug!(service = %descriptor.name, url = %url, error = %e, "Probe candidate unreachable");
                    last_error = Some(MonitorError::connectivity(&descriptor.name, e));
                }
            }
        }

        let latency = started.elapsed();
        match last_status {
            Some(status) => HealthResult {
                status: HealthStatus::Unhealthy,
                latency,
                detail: Some(
                    MonitorError::Protocol {
                        service: descriptor.name.clone(),
                        status: status.as_u16(),
                    }
                    .to_string(),
                ),
                probed_via: ProbeMethod::HttpProbe,
                http_status: Some(status.as_u16()),
            },
            None => HealthResult {
                status: HealthStatus::Timeout,
                latency,
                detail: last_error.map(|e| e.to_string()),
                probed_via: ProbeMethod::HttpProbe,
                http_status: None,
            },
        }
    }

    /// Probe every descriptor with bounded parallelism.
    ///
    /// Results come back in input order. Probes still outstanding when the
    /// round deadline passes are reported as timed out.
    pub async fn probe_round(
        &self,
        descriptors: &[ServiceDescriptor],
    ) -> Vec<(ServiceDescriptor, HealthResult)> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.round_timeout;
        let mut completed: HashMap<usize, HealthResult> = HashMap::with_capacity(descriptors.len());

        // Collected first: a stream mapping over borrowed descriptors is not `Send`
        let probes: Vec<_> = descriptors
            .iter()
            .enumerate()
            .map(|(idx, descriptor)| async move { (idx, self.probe(descriptor).await) })
            .collect();
        let mut pending = stream::iter(probes).buffer_unordered(self.concurrency);

        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((idx, result))) => {
                    completed.insert(idx, result);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        completed = completed.len(),
                        total = descriptors.len(),
                        deadline_secs = self.round_timeout.as_secs_f64(),
                        "Probe round deadline exceeded, recording stragglers as timed out"
                    );
                    break;
                }
            }
        }

        descriptors
            .iter()
            .enumerate()
            .map(|(idx, descriptor)| {
                let result = completed
                    .remove(&idx)
                    .unwrap_or_else(|| HealthResult::deadline_exceeded(started.elapsed()));
                (descriptor.clone(), result)
            })
            .collect()
    }
}
