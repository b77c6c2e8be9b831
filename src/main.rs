//! hydra-signals stress runner.
//!
//! Runs every stress scenario against the registry and prints the report as
//! JSON. Exits with an error if any scenario stalls or leaks.

use tracing_subscriber::EnvFilter;

use hydra_signals::{RegistryConfig, StressHarness};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = RegistryConfig::from_env()?;
    tracing::info!(
        threads = config.stress_threads,
        iterations = config.stress_iterations,
        watchdog_ms = config.watchdog_timeout_ms,
        "starting stress run"
    );

    let report = StressHarness::new(config).run_all().await?;
    println!("{}", report.to_json_pretty()?);

    tracing::info!(scenarios = report.scenarios.len(), "stress run passed");
    Ok(())
}
