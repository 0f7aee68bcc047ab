//! Health report for the store connection and the category index.

use serde::Serialize;

/// Overall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every check passed.
    Healthy,
    /// Recommendations still work but some results may be stale or empty.
    Degraded,
    /// The store is unreachable.
    Unhealthy,
}

/// Individual check outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check", rename_all = "camelCase")]
pub enum Check {
    /// A session could be acquired and answered a ping.
    Store {
        /// Store description.
        source: String,
        /// Whether the store answered.
        healthy: bool,
    },
    /// Age of the category index snapshot.
    IndexAge {
        /// Seconds since the snapshot was built.
        seconds: u64,
        /// Age after which the snapshot is reported as stale.
        threshold: u64,
        /// Whether the snapshot is younger than the threshold.
        healthy: bool,
    },
    /// Whether the index holds any entries.
    IndexPopulated {
        /// (category, item) pairs in the snapshot.
        entries: usize,
        /// Whether at least one pair is present.
        healthy: bool,
    },
}

impl Check {
    fn healthy(&self) -> bool {
        match self {
            Check::Store { healthy, .. }
            | Check::IndexAge { healthy, .. }
            | Check::IndexPopulated { healthy, .. } => *healthy,
        }
    }
}

/// Aggregated checks.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Worst status among the checks.
    pub status: HealthStatus,
    /// Checks in the order they ran.
    pub checks: Vec<Check>,
}

impl HealthReport {
    /// Empty, healthy report.
    pub fn new() -> Self {
        Self {
            status: HealthStatus::Healthy,
            checks: Vec::new(),
        }
    }

    /// Records `check`, downgrading the status when it failed. A failed store
    /// check makes the report unhealthy.
    pub fn add_check(&mut self, check: Check) {
        if !check.healthy() {
            self.status = match (&check, self.status) {
                (Check::Store { .. }, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
                _ => HealthStatus::Degraded,
            };
        }
        self.checks.push(check);
    }

    /// Whether the store is reachable (stale or empty indexes still serve).
    pub fn is_serving(&self) -> bool {
        self.status != HealthStatus::Unhealthy
    }

    /// Whether every check passed.
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

impl Default for HealthReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_checks_degrade_and_store_failures_dominate() {
        let mut report = HealthReport::new();
        report.add_check(Check::IndexPopulated {
            entries: 0,
            healthy: false,
        });
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.is_serving());

        report.add_check(Check::Store {
            source: "memory".into(),
            healthy: false,
        });
        assert_eq!(report.status, HealthStatus::Unhealthy);

        report.add_check(Check::IndexAge {
            seconds: 10,
            threshold: 5,
            healthy: false,
        });
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(!report.is_serving());
    }

    #[test]
    fn checks_serialize_with_a_tag() {
        let json = serde_json::to_value(Check::Store {
            source: "memory".into(),
            healthy: true,
        })
        .expect("json");
        assert_eq!(
            json,
            serde_json::json!({"check": "store", "source": "memory", "healthy": true})
        );
    }
}
