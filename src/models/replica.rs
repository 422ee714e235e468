use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::utils::serde_secs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaSetHealth {
    Healthy,
    Degraded,
    SingleNode,
    Error,
}

impl ReplicaSetHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicaSetHealth::Healthy => "healthy",
            ReplicaSetHealth::Degraded => "degraded",
            ReplicaSetHealth::SingleNode => "single_node",
            ReplicaSetHealth::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Primary,
    Secondary,
    Arbiter,
    Unknown,
}

impl MemberRole {
    /// Replica-set member state codes as reported by `replSetGetStatus`
    pub fn from_state_code(state: i32) -> Self {
        match state {
            1 => MemberRole::Primary,
            2 => MemberRole::Secondary,
            7 => MemberRole::Arbiter,
            _ => MemberRole::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Primary => "primary",
            MemberRole::Secondary => "secondary",
            MemberRole::Arbiter => "arbiter",
            MemberRole::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicaMember {
    pub name: String,
    pub role: MemberRole,
    pub healthy: bool,
}

impl ReplicaMember {
    pub fn host(&self) -> &str {
        self.name.split(':').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplicaSetStatus {
    pub set_name: String,
    pub overall: ReplicaSetHealth,
    pub primary_member: Option<String>,
    pub members: Vec<ReplicaMember>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ReplicaSetStatus {
    pub fn healthy_members(&self) -> usize {
        self.members.iter().filter(|m| m.healthy).count()
    }

    pub fn member_for_host(&self, host: &str) -> Option<&ReplicaMember> {
        self.members.iter().find(|m| m.host() == host)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LagStatus {
    Healthy,
    Warning,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplicationLagSample {
    pub sentinel_id: String,
    pub working: bool,
    #[serde(rename = "lag_seconds", serialize_with = "serde_secs::serialize")]
    pub lag: Duration,
    pub attempts: u32,
    pub status: LagStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Figures gathered through one store route
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteStats {
    pub data_size_mb: f64,
    pub storage_size_mb: f64,
    pub index_size_mb: f64,
    pub collections: u64,
    pub objects: u64,
    pub users_count: u64,
    pub videos_count: u64,
    pub views_count: u64,
}

/// Either the stats of a route, or why they could not be read
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RouteReport {
    Available(RouteStats),
    Unavailable { error: String },
}

impl RouteReport {
    pub fn stats(&self) -> Option<&RouteStats> {
        match self {
            RouteReport::Available(stats) => Some(stats),
            RouteReport::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, RouteReport::Available(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreMetrics {
    pub primary: RouteReport,
    pub secondary: RouteReport,
    pub replica_set_name: Option<String>,
    pub collected_at: DateTime<Utc>,
}
