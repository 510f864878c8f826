//! Health report entries
//!
//! A health check returns an ordered list of entries, one per dependency.
//! Wrappers append their own entries after the ones they receive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a single dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "err")]
    Err,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Err => "err",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthEntry {
    /// Name of the checked service.
    pub service: String,
    pub status: HealthStatus,
    /// When the check ran.
    pub time: DateTime<Utc>,
}

impl HealthEntry {
    /// Entry stamped with the current time.
    pub fn now(service: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            service: service.into(),
            status,
            time: Utc::now(),
        }
    }

    pub fn ok(service: impl Into<String>) -> Self {
        Self::now(service, HealthStatus::Ok)
    }

    pub fn err(service: impl Into<String>) -> Self {
        Self::now(service, HealthStatus::Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&HealthStatus::Ok).unwrap(), "\"OK\"");
        assert_eq!(serde_json::to_string(&HealthStatus::Err).unwrap(), "\"err\"");
        assert_eq!(HealthStatus::Err.to_string(), "err");
    }

    #[test]
    fn test_entry_constructors() {
        let entry = HealthEntry::ok("catalogue");
        assert_eq!(entry.service, "catalogue");
        assert!(entry.status.is_ok());
        assert!(!HealthEntry::err("catalogue-db").status.is_ok());
    }
}
