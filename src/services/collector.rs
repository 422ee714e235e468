// Collector service - periodic tasks feeding the metrics store and trend history
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::aggregation::availability_percent;
use super::synthetic::{self, BYTES_IN_PER_SERVICE, BYTES_OUT_PER_SERVICE};
use super::{MonitorContext, RollingHistory};
use crate::config::CollectorConfig;
use crate::models::{HealthStatus, MetricSample, ReplicaSetHealth};

/// Latency recorded for a probe that timed out or errored
pub const PENALTY_LATENCY_SECS: f64 = 5.0;

/// Added to the streaming service's probe latency for the streaming histogram
pub const STREAMING_OVERHEAD_SECS: f64 = 0.05;

/// Lag gauge value while replication cannot be confirmed
pub const UNREPLICATED_LAG_SECS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    pub cadence: Duration,
    pub recovery: Duration,
}

impl Schedule {
    pub fn new(cadence_secs: u64, recovery_ratio: f64) -> Self {
        let cadence = Duration::from_secs(cadence_secs.max(1));
        Self {
            cadence,
            recovery: cadence.mul_f64(recovery_ratio.clamp(0.05, 1.0)),
        }
    }
}

/// A failed cycle is retried after the recovery interval and never stops the
/// loop or the other collectors.
#[async_trait]
pub trait CollectorTask: Send + Sync {
    fn name(&self) -> &'static str;

    fn schedule(&self) -> Schedule;

    async fn run_cycle(&self) -> anyhow::Result<()>;
}

pub struct LatencyCollector {
    ctx: MonitorContext,
    schedule: Schedule,
    streaming_service: String,
}

#[async_trait]
impl CollectorTask for LatencyCollector {
    fn name(&self) -> &'static str {
        "latency"
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        let results = self.ctx.prober.probe_round(self.ctx.directory.list()).await;

        for (descriptor, result) in &results {
            let seconds = match result.status {
                HealthStatus::Timeout | HealthStatus::Error => PENALTY_LATENCY_SECS,
                HealthStatus::Healthy | HealthStatus::Unhealthy => result.latency.as_secs_f64(),
            };
            self.ctx.metrics.observe_latency(&descriptor.name, seconds);

            if descriptor.name == self.streaming_service && result.is_healthy() {
                self.ctx
                    .metrics
                    .observe_streaming_latency(result.latency.as_secs_f64() + STREAMING_OVERHEAD_SECS);
            }
        }

        debug!(task = self.name(), services = results.len(), "Latency cycle complete");
        Ok(())
    }
}

pub struct ThroughputCollector {
    ctx: MonitorContext,
    schedule: Schedule,
}

#[async_trait]
impl CollectorTask for ThroughputCollector {
    fn name(&self) -> &'static str {
        "throughput"
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        let now = Utc::now().timestamp();
        let services = self.ctx.directory.list();

        for descriptor in services {
            let requests = synthetic::request_increment(&descriptor.name, now);
            self.ctx
                .metrics
                .add_requests(&descriptor.name, "GET", "200", requests);
        }

        let count = services.len() as u64;
        self.ctx.metrics.add_data_bytes("in", count * BYTES_IN_PER_SERVICE);
        self.ctx.metrics.add_data_bytes("out", count * BYTES_OUT_PER_SERVICE);

        debug!(task = self.name(), services = count, "Throughput cycle complete");
        Ok(())
    }
}

pub struct ResourceCollector {
    ctx: MonitorContext,
    schedule: Schedule,
}

#[async_trait]
impl CollectorTask for ResourceCollector {
    fn name(&self) -> &'static str {
        "resource"
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        let host = self.ctx.host.sample().await;
        let services = self.ctx.directory.list();

        for (index, descriptor) in services.iter().enumerate() {
            let (cpu, memory) = synthetic::resource_share(
                &descriptor.name,
                index,
                services.len(),
                host.cpu_percent,
                host.memory_percent,
            );
            self.ctx
                .metrics
                .set_service_resources(&descriptor.name, cpu, memory);
        }

        debug!(
            task = self.name(),
            cpu_percent = host.cpu_percent,
            memory_percent = host.memory_percent,
            "Resource cycle complete"
        );
        Ok(())
    }
}

pub struct ReplicationCollector {
    ctx: MonitorContext,
    schedule: Schedule,
}

#[async_trait]
impl CollectorTask for ReplicationCollector {
    fn name(&self) -> &'static str {
        "replication"
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        let topology = self.ctx.inspector.get_topology().await;
        if topology.overall != ReplicaSetHealth::Error {
            for member in &topology.members {
                self.ctx
                    .metrics
                    .set_member_status(&member.name, member.role.as_str(), member.healthy);
            }
        }

        let lag = self.ctx.inspector.measure_lag().await;
        let gauge = if lag.working {
            lag.lag.as_secs_f64()
        } else {
            UNREPLICATED_LAG_SECS
        };
        self.ctx.metrics.set_replication_lag(gauge);

        if topology.overall == ReplicaSetHealth::Error {
            return Err(anyhow!(
                "replica set {} unavailable: {}",
                topology.set_name,
                topology.detail.unwrap_or_default()
            ));
        }

        debug!(
            task = self.name(),
            overall = ?topology.overall,
            lag_secs = gauge,
            replication_working = lag.working,
            "Replication cycle complete"
        );
        Ok(())
    }
}

pub struct TrendCollector {
    ctx: MonitorContext,
    schedule: Schedule,
}

#[async_trait]
impl CollectorTask for TrendCollector {
    fn name(&self) -> &'static str {
        "trend_analysis"
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        let results = self.ctx.prober.probe_round(self.ctx.directory.list()).await;
        let healthy = results.iter().filter(|(_, r)| r.is_healthy()).count();
        let availability = availability_percent(healthy, results.len());

        let (host, store) = tokio::join!(self.ctx.host.sample(), self.ctx.inspector.get_metrics());

        self.ctx.history.push(MetricSample {
            timestamp: Utc::now(),
            cpu_percent: host.cpu_percent,
            memory_percent: host.memory_percent,
            services_count: results.len(),
            availability_percent: availability,
            primary_store_ok: store.primary.is_available(),
            secondary_store_ok: store.secondary.is_available(),
        });
        self.ctx.metrics.set_availability(availability);

        info!(
            task = self.name(),
            availability_percent = availability,
            healthy,
            total = results.len(),
            cpu_percent = host.cpu_percent,
            memory_percent = host.memory_percent,
            data_points = self.ctx.history.len(),
            "Trend sample recorded"
        );
        Ok(())
    }
}

/// Drive one collector until shutdown is signalled.
///
/// Shutdown is honoured both between cycles and in the middle of one.
pub async fn run_task_loop(task: Arc<dyn CollectorTask>, mut shutdown: broadcast::Receiver<()>) {
    let schedule = task.schedule();
    let mut consecutive_failures = 0u32;

    info!(
        task = task.name(),
        cadence_secs = schedule.cadence.as_secs_f64(),
        recovery_secs = schedule.recovery.as_secs_f64(),
        "Starting collector loop"
    );

    loop {
        let outcome = tokio::select! {
            outcome = task.run_cycle() => outcome,
            _ = shutdown.recv() => break,
        };

        let pause = match outcome {
            Ok(()) => {
                if consecutive_failures > 0 {
                    info!(
                        task = task.name(),
                        recovered_after = consecutive_failures,
                        "Collector recovered after failures"
                    );
                    consecutive_failures = 0;
                }
                schedule.cadence
            }
            Err(e) => {
                consecutive_failures += 1;
                error!(
                    task = task.name(),
                    error = %e,
                    consecutive_failures,
                    "Collector cycle failed, retrying after recovery interval"
                );
                schedule.recovery
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = shutdown.recv() => break,
        }
    }

    info!(task = task.name(), "Collector loop stopped");
}

/// Owns the collector tasks for the lifetime of the process
pub struct Supervisor {
    shutdown: broadcast::Sender<()>,
    active: Arc<AtomicUsize>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    history: Arc<RollingHistory>,
}

impl Supervisor {
    /// Spawn the five standard collectors
    pub fn start(ctx: MonitorContext, config: &CollectorConfig) -> Self {
        let ratio = config.recovery_ratio;
        let history = Arc::clone(&ctx.history);
        let tasks: Vec<Arc<dyn CollectorTask>> = vec![
            Arc::new(LatencyCollector {
                ctx: ctx.clone(),
                schedule: Schedule::new(config.latency_interval_secs, ratio),
                streaming_service: config.streaming_service.clone(),
            }),
            Arc::new(ThroughputCollector {
                ctx: ctx.clone(),
                schedule: Schedule::new(config.throughput_interval_secs, ratio),
            }),
            Arc::new(ResourceCollector {
                ctx: ctx.clone(),
                schedule: Schedule::new(config.resource_interval_secs, ratio),
            }),
            Arc::new(ReplicationCollector {
                ctx: ctx.clone(),
                schedule: Schedule::new(config.replication_interval_secs, ratio),
            }),
            Arc::new(TrendCollector {
                ctx,
                schedule: Schedule::new(config.trend_interval_secs, ratio),
            }),
        ];

        Self::with_tasks(tasks, history)
    }

    pub fn with_tasks(tasks: Vec<Arc<dyn CollectorTask>>, history: Arc<RollingHistory>) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        let active = Arc::new(AtomicUsize::new(0));

        let handles = tasks
            .into_iter()
            .map(|task| {
                let receiver = shutdown.subscribe();
                let active = Arc::clone(&active);
                active.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    run_task_loop(task, receiver).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        info!("Metrics collectors started");

        Self {
            shutdown,
            active,
            handles: Mutex::new(handles),
            history,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    pub fn history(&self) -> Arc<RollingHistory> {
        Arc::clone(&self.history)
    }

    /// Signal every collector and wait for the loops to exit
    pub async fn shutdown(&self) {
        // No receivers left means every loop already exited
        let _ = self.shutdown.send(());

        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Collector task ended abnormally");
            }
        }
        info!("Metrics collectors stopped");
    }
}
