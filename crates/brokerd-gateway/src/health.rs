//! Health and readiness checks (spec §6: `GET /healthz`, `GET /readyz`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Overall health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    /// All systems healthy.
    Healthy,
    /// Some non-critical issues.
    Degraded,
    /// Critical issues.
    Unhealthy,
    /// Unknown state.
    Unknown,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of a single health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Name of the component being checked.
    pub component: String,
    /// Health state.
    pub state: HealthState,
    /// Human-readable message.
    pub message: Option<String>,
    /// Check duration.
    pub duration_ms: u64,
    /// When this check was performed.
    pub checked_at: DateTime<Utc>,
    /// Additional details.
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
}

impl HealthCheck {
    /// Create a healthy check result.
    #[must_use]
    pub fn healthy(component: impl Into<String>, duration: Duration) -> Self {
        Self {
            component: component.into(),
            state: HealthState::Healthy,
            message: None,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            checked_at: Utc::now(),
            details: HashMap::new(),
        }
    }

    /// Create an unhealthy check result.
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            component: component.into(),
            state: HealthState::Unhealthy,
            message: Some(message.into()),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            checked_at: Utc::now(),
            details: HashMap::new(),
        }
    }

    /// Create a degraded check result.
    #[must_use]
    pub fn degraded(component: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            component: component.into(),
            state: HealthState::Degraded,
            message: Some(message.into()),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            checked_at: Utc::now(),
            details: HashMap::new(),
        }
    }

    /// Add a detail.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.insert(key.into(), v);
        }
        self
    }
}

/// Overall health/readiness status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall state.
    pub state: HealthState,
    /// When this status was computed.
    pub checked_at: DateTime<Utc>,
    /// Individual check results.
    pub checks: Vec<HealthCheck>,
    /// Gateway uptime.
    pub uptime_secs: u64,
    /// Version information.
    pub version: String,
}

impl HealthStatus {
    /// Create a new health status from check results.
    #[must_use]
    pub fn from_checks(checks: Vec<HealthCheck>, uptime: Duration, version: impl Into<String>) -> Self {
        let state = Self::aggregate_state(&checks);
        Self { state, checked_at: Utc::now(), checks, uptime_secs: uptime.as_secs(), version: version.into() }
    }

    fn aggregate_state(checks: &[HealthCheck]) -> HealthState {
        if checks.is_empty() {
            return HealthState::Unknown;
        }
        let has_unhealthy = checks.iter().any(|c| c.state == HealthState::Unhealthy);
        let has_degraded = checks.iter().any(|c| c.state == HealthState::Degraded);
        let has_unknown = checks.iter().any(|c| c.state == HealthState::Unknown);
        if has_unhealthy {
            HealthState::Unhealthy
        } else if has_degraded || has_unknown {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        }
    }

    /// Check if healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }

    /// Get unhealthy checks.
    #[must_use]
    pub fn unhealthy_checks(&self) -> Vec<&HealthCheck> {
        self.checks.iter().filter(|c| c.state == HealthState::Unhealthy).collect()
    }
}

/// Liveness: the process is up and answering requests. Carries no
/// dependency checks (spec §6: `GET /healthz` is "liveness" only).
#[must_use]
pub fn liveness(uptime: Duration, version: &str) -> HealthStatus {
    let check = HealthCheck::healthy("process", Duration::ZERO);
    HealthStatus::from_checks(vec![check], uptime, version)
}

/// Readiness: backend-binary discovery plus the persistence tier the
/// session registry depends on (spec §6: "readiness incl. backend binary
/// discovery").
pub async fn readiness(
    persistence_reachable: bool,
    backend_binaries: &[String],
    sdk_client_configured: bool,
    live_session_count: usize,
    max_concurrent_sessions: usize,
    uptime: Duration,
    version: &str,
) -> HealthStatus {
    let mut checks = Vec::new();

    let start = std::time::Instant::now();
    let persistence_check = if persistence_reachable {
        HealthCheck::healthy("persistence", start.elapsed())
    } else {
        HealthCheck::unhealthy("persistence", "persistence store unreachable", start.elapsed())
    };
    checks.push(persistence_check);

    let start = std::time::Instant::now();
    let backend_check = if backend_binaries.is_empty() {
        HealthCheck::degraded("backend_discovery", "no backend binaries discovered on PATH", start.elapsed())
    } else {
        HealthCheck::healthy("backend_discovery", start.elapsed()).with_detail("binaries", backend_binaries)
    };
    checks.push(backend_check);

    let start = std::time::Instant::now();
    let sdk_check = if sdk_client_configured {
        HealthCheck::healthy("sdk_client", start.elapsed())
    } else {
        HealthCheck::degraded("sdk_client", "no in-process SDK client configured", start.elapsed())
    };
    checks.push(sdk_check);

    let start = std::time::Instant::now();
    let capacity_check = if live_session_count < max_concurrent_sessions {
        HealthCheck::healthy("session_capacity", start.elapsed())
            .with_detail("live", live_session_count)
            .with_detail("max", max_concurrent_sessions)
    } else {
        HealthCheck::degraded("session_capacity", "at max concurrent sessions", start.elapsed())
    };
    checks.push(capacity_check);

    HealthStatus::from_checks(checks, uptime, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_state_display_matches_wire_values() {
        assert_eq!(HealthState::Healthy.to_string(), "healthy");
        assert_eq!(HealthState::Degraded.to_string(), "degraded");
        assert_eq!(HealthState::Unhealthy.to_string(), "unhealthy");
    }

    #[test]
    fn aggregation_escalates_to_the_worst_check() {
        let checks = vec![HealthCheck::healthy("a", Duration::ZERO), HealthCheck::degraded("b", "x", Duration::ZERO)];
        assert_eq!(HealthStatus::from_checks(checks, Duration::ZERO, "v").state, HealthState::Degraded);

        let checks = vec![HealthCheck::healthy("a", Duration::ZERO), HealthCheck::unhealthy("b", "x", Duration::ZERO)];
        assert_eq!(HealthStatus::from_checks(checks, Duration::ZERO, "v").state, HealthState::Unhealthy);
    }

    #[test]
    fn liveness_never_depends_on_collaborators() {
        let status = liveness(Duration::from_secs(10), "0.1.0");
        assert!(status.is_healthy());
        assert_eq!(status.checks.len(), 1);
    }

    #[tokio::test]
    async fn readiness_is_unhealthy_when_persistence_is_unreachable() {
        let status = readiness(false, &["claude".to_string()], true, 0, 50, Duration::ZERO, "0.1.0").await;
        assert_eq!(status.state, HealthState::Unhealthy);
        assert_eq!(status.unhealthy_checks()[0].component, "persistence");
    }

    #[tokio::test]
    async fn readiness_degrades_with_no_discovered_backends() {
        let status = readiness(true, &[], true, 0, 50, Duration::ZERO, "0.1.0").await;
        assert_eq!(status.state, HealthState::Degraded);
    }

    #[tokio::test]
    async fn readiness_is_healthy_when_every_dependency_is_up() {
        let status = readiness(true, &["claude".to_string()], true, 1, 50, Duration::ZERO, "0.1.0").await;
        assert!(status.is_healthy());
    }
}
