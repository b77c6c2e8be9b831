//! Multi-threaded stress harness.
//!
//! Every scenario gets a fresh [`Context`], runs its workers as blocking
//! tasks on the tokio runtime, and is failed by a watchdog if the workers do
//! not finish in time (a stalled scenario is how a lock-order bug shows up).
//! Once the workers are done every participant is dropped and the context's
//! accounting must balance: each connection made was destroyed exactly once,
//! each node allocated was released, each lock domain was freed.

pub mod report;
pub mod scenario;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;

pub use report::{ScenarioReport, StressReport, WorkerTally};
pub use scenario::{Churn, CrossConnect, FireStorm, Scenario};

use crate::config::RegistryConfig;
use crate::context::Context;
use crate::error::SignalError;

/// Runs stress scenarios against the registry.
#[derive(Debug, Clone)]
pub struct StressHarness {
    config: RegistryConfig,
}

impl StressHarness {
    /// Creates a harness; thread count, iterations and watchdog budget come
    /// from `config`.
    #[must_use]
    pub const fn new(config: RegistryConfig) -> Self {
        Self { config }
    }

    /// Runs every scenario in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first scenario's [`SignalError`].
    pub async fn run_all(&self) -> Result<StressReport, SignalError> {
        let started_at = Utc::now();
        let scenarios = vec![
            self.run::<Churn>().await?,
            self.run::<CrossConnect>().await?,
            self.run::<FireStorm>().await?,
        ];
        Ok(StressReport {
            started_at,
            finished_at: Utc::now(),
            scenarios,
        })
    }

    /// Runs one scenario.
    ///
    /// # Errors
    ///
    /// - [`SignalError::WatchdogTimeout`] if the workers stall.
    /// - [`SignalError::WorkerFailed`] if a worker panics.
    /// - [`SignalError::InvariantViolated`] if the scenario's own checks fail
    ///   or the accounting does not balance afterwards.
    pub async fn run<S: Scenario>(&self) -> Result<ScenarioReport, SignalError> {
        let context = Context::new(self.config.clone());
        let threads = self.config.stress_threads;
        let iterations = self.config.stress_iterations;
        let timeout_ms = self.config.watchdog_timeout_ms;
        let started_at = Utc::now();
        let clock = Instant::now();
        tracing::info!(scenario = S::NAME, threads, iterations, "scenario started");

        let scenario = {
            let _entered = context.enter();
            Arc::new(S::setup(&context))
        };
        let workers = (0..threads).map(|worker| {
            let context = context.clone();
            let scenario = Arc::clone(&scenario);
            tokio::task::spawn_blocking(move || {
                let _entered = context.enter();
                scenario.work(&context, worker, iterations)
            })
        });

        let budget = Duration::from_millis(timeout_ms);
        let Ok(results) = tokio::time::timeout(budget, join_all(workers)).await else {
            tracing::error!(scenario = S::NAME, timeout_ms, "watchdog fired");
            return Err(SignalError::WatchdogTimeout {
                scenario: S::NAME.to_string(),
                timeout_ms,
            });
        };

        let mut totals = WorkerTally::default();
        for result in results {
            let tally = result
                .map_err(|e| SignalError::WorkerFailed(format!("{}: {e}", S::NAME)))??;
            totals.merge(&tally);
        }
        scenario.verify(&totals)?;
        drop(scenario);

        let stats = context.stats();
        if !stats.is_balanced() {
            tracing::error!(scenario = S::NAME, ?stats, "accounting does not balance");
            return Err(SignalError::InvariantViolated(format!(
                "{}: {} of {} connections and {} of {} domains released",
                S::NAME,
                stats.connections_destroyed,
                stats.connections_made,
                stats.domains_released,
                stats.domains_created
            )));
        }

        let elapsed_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            scenario = S::NAME,
            elapsed_ms,
            connections = stats.connections_made,
            "scenario passed"
        );
        Ok(ScenarioReport {
            name: S::NAME.to_string(),
            threads,
            iterations,
            started_at,
            elapsed_ms,
            totals,
            stats,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn small_config() -> RegistryConfig {
        RegistryConfig {
            stress_threads: 4,
            stress_iterations: 200,
            watchdog_timeout_ms: 30_000,
            ..RegistryConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_all_reports_every_scenario_balanced() {
        let harness = StressHarness::new(small_config());
        let report = match harness.run_all().await {
            Ok(report) => report,
            Err(err) => panic!("stress run failed: {err}"),
        };
        let names: Vec<&str> = report.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["churn", "cross_connect", "fire_storm"]);
        assert!(report.is_clean());
        assert!(report.finished_at >= report.started_at);
    }

    #[tokio::test]
    async fn cross_connect_finishes_before_the_watchdog() {
        let harness = StressHarness::new(small_config());
        let report = match harness.run::<CrossConnect>().await {
            Ok(report) => report,
            Err(err) => panic!("cross_connect failed: {err}"),
        };
        assert_eq!(report.totals.connects, 800);
        assert_eq!(report.stats.connections_rejected, 0);
        assert!(report.stats.is_balanced());
    }

    #[tokio::test]
    async fn fire_storm_accounts_for_every_subscriber() {
        let harness = StressHarness::new(small_config());
        let report = match harness.run::<FireStorm>().await {
            Ok(report) => report,
            Err(err) => panic!("fire_storm failed: {err}"),
        };
        assert_eq!(report.totals.connects, 400);
        assert_eq!(report.stats.threads_attached, 5);
    }
}
