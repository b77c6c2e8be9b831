//! Stress harness results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::context::StatsSnapshot;
use crate::error::SignalError;

/// Operations one worker performed, summed across workers per scenario.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerTally {
    /// Connections successfully established.
    pub connects: u64,
    /// `disconnect()` calls that removed a connection.
    pub disconnects: u64,
    /// `disconnect()` calls that found the connection already gone.
    pub stale_disconnects: u64,
    /// `fire()` calls.
    pub fires: u64,
    /// Callbacks invoked across all fires.
    pub invocations: u64,
}

impl WorkerTally {
    /// Adds `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        self.connects += other.connects;
        self.disconnects += other.disconnects;
        self.stale_disconnects += other.stale_disconnects;
        self.fires += other.fires;
        self.invocations += other.invocations;
    }

    /// Records the outcome of one `disconnect()` call.
    pub fn record_disconnect(&mut self, removed: bool) {
        if removed {
            self.disconnects += 1;
        } else {
            self.stale_disconnects += 1;
        }
    }
}

/// Outcome of one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// Worker threads used.
    pub threads: usize,
    /// Iterations per worker.
    pub iterations: usize,
    /// When the scenario started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
    /// Summed worker operations.
    pub totals: WorkerTally,
    /// Registry accounting after every participant was dropped.
    pub stats: StatsSnapshot,
}

/// Outcome of a full harness run.
#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the last scenario finished.
    pub finished_at: DateTime<Utc>,
    /// One entry per scenario, in run order.
    pub scenarios: Vec<ScenarioReport>,
}

impl StressReport {
    /// Returns `true` if every scenario released everything it created.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.scenarios
            .iter()
            .all(|scenario| scenario.stats.is_balanced())
    }

    /// Renders the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Serialization`] if encoding fails.
    pub fn to_json_pretty(&self) -> Result<String, SignalError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
