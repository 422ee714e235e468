use serde::Serialize;
use sysinfo::System;
use tokio::sync::Mutex;

use crate::utils::round_to;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HostSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_gb: f64,
}

/// Samples CPU and memory of the host running the admin component
pub struct HostSampler {
    system: Mutex<System>,
}

impl HostSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta between two refreshes; seed the first one
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }

    pub async fn sample(&self) -> HostSnapshot {
        let mut system = self.system.lock().await;

        system.refresh_cpu();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        system.refresh_cpu();
        system.refresh_memory();

        let total = system.total_memory();
        let used = system.used_memory();
        let memory_percent = if total == 0 {
            0.0
        } else {
            used as f64 * 100.0 / total as f64
        };

        HostSnapshot {
            cpu_percent: round_to(system.global_cpu_info().cpu_usage() as f64, 1),
            memory_percent: round_to(memory_percent, 1),
            memory_used_gb: round_to(used as f64 / BYTES_PER_GB, 2),
        }
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}
