use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::{serde_secs, title_case};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Microservice,
    Processor,
    Messaging,
    DataStoreNode,
}

/// One entry of the service directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub base_url: String,
    pub kind: ServiceKind,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, kind: ServiceKind) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            kind,
        }
    }

    /// `host:port` portion of the base URL
    pub fn instance(&self) -> &str {
        let without_scheme = self
            .base_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.base_url);
        without_scheme.split('/').next().unwrap_or(without_scheme)
    }

    /// Host without the port
    pub fn host(&self) -> &str {
        let instance = self.instance();
        instance.split(':').next().unwrap_or(instance)
    }

    pub fn display_name(&self) -> String {
        title_case(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Timeout,
    Error,
}

/// How a health result was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMethod {
    HttpProbe,
    AssumedHealthy,
    SyntheticFallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResult {
    pub status: HealthStatus,
    #[serde(rename = "latency_seconds", serialize_with = "serde_secs::serialize")]
    pub latency: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub probed_via: ProbeMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Timeout => "timeout",
            HealthStatus::Error => "error",
        }
    }
}

impl HealthResult {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Result recorded for a probe that did not finish before the round deadline
    pub fn deadline_exceeded(waited: Duration) -> Self {
        Self {
            status: HealthStatus::Timeout,
            latency: waited,
            detail: Some("collection deadline exceeded".to_string()),
            probed_via: ProbeMethod::SyntheticFallback,
            http_status: None,
        }
    }
}
