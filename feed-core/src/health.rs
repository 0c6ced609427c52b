//! Health probe types
//!
//! Snapshots are immutable: every monitoring pass builds a new
//! [`AggregateHealth`] and callers diff successive snapshots if they need
//! trends.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored upstream endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub name: String,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_expected_status() -> u16 {
    200
}

impl ProbeSpec {
    pub fn get(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method: default_method(),
            expected_status: default_expected_status(),
        }
    }
}

/// Outcome of one probe execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthProbeResult {
    pub service_name: String,
    pub healthy: bool,
    pub status_code: Option<u16>,
    pub latency_ms: Option<f64>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthProbeResult {
    /// Probe got an answer; healthy iff the status matches
    pub fn responded(
        service_name: impl Into<String>,
        status_code: u16,
        expected_status: u16,
        latency_ms: f64,
    ) -> Self {
        let healthy = status_code == expected_status;
        Self {
            service_name: service_name.into(),
            healthy,
            status_code: Some(status_code),
            latency_ms: Some(latency_ms),
            error: (!healthy).then(|| format!("Unexpected status code: {}", status_code)),
            checked_at: Utc::now(),
        }
    }

    /// Probe failed before getting an answer
    pub fn failed(service_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            healthy: false,
            status_code: None,
            latency_ms: None,
            error: Some(error.into()),
            checked_at: Utc::now(),
        }
    }

    pub fn timed_out(service_name: impl Into<String>) -> Self {
        Self::failed(service_name, "timeout")
    }
}

/// Aggregated result of one monitoring pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateHealth {
    pub total: usize,
    pub healthy: usize,
    /// 0.0 - 100.0
    pub percentage: f64,
    pub overall_healthy: bool,
    pub results: BTreeMap<String, HealthProbeResult>,
    pub checked_at: DateTime<Utc>,
}

impl AggregateHealth {
    pub fn from_results(results: impl IntoIterator<Item = HealthProbeResult>) -> Self {
        let results: BTreeMap<String, HealthProbeResult> = results
            .into_iter()
            .map(|r| (r.service_name.clone(), r))
            .collect();

        let total = results.len();
        let healthy = results.values().filter(|r| r.healthy).count();
        let percentage = if total > 0 {
            healthy as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total,
            healthy,
            percentage,
            // Nothing monitored is not the same as everything healthy
            overall_healthy: total > 0 && healthy == total,
            results,
            checked_at: Utc::now(),
        }
    }

    pub fn unhealthy_services(&self) -> impl Iterator<Item = &HealthProbeResult> {
        self.results.values().filter(|r| !r.healthy)
    }
}

/// Coarse status band derived from the health percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthBand {
    Healthy,
    Degraded,
    Critical,
}

/// Thresholds mapping a health percentage to a band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthPolicy {
    /// Below this percentage the system is at least degraded
    pub degraded_below: f64,
    /// Below this percentage the system is critical
    pub critical_below: f64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            degraded_below: 100.0,
            critical_below: 50.0,
        }
    }
}

impl HealthPolicy {
    pub fn classify(&self, health: &AggregateHealth) -> HealthBand {
        if health.total == 0 || health.percentage < self.critical_below {
            HealthBand::Critical
        } else if health.percentage < self.degraded_below {
            HealthBand::Degraded
        } else {
            HealthBand::Healthy
        }
    }
}
