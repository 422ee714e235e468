// Utility functions for the admin service

use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Format datetime for API responses
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// "catalog_service" -> "Catalog Service"
pub fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic hash used to derive synthetic per-service figures.
///
/// Stable for the lifetime of the process, which is all the synthetic
/// instruments need.
pub fn stable_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Round to a fixed number of decimals for display
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Serialize a `Duration` as fractional seconds
pub mod serde_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("catalog_service"), "Catalog Service");
        assert_eq!(title_case("ualflix_db_primary"), "Ualflix Db Primary");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_stable_hash_is_deterministic() {
        assert_eq!(stable_hash("queue_service"), stable_hash("queue_service"));
        assert_ne!(stable_hash("queue_service"), stable_hash("catalog_service"));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(85.714285, 1), 85.7);
        assert_eq!(round_to(1.005, 0), 1.0);
    }
}
