//! Error types for configuration and the stress harness.
//!
//! The connection registry itself never returns errors: disconnect races
//! resolve through the teardown protocol of the node lists, and a
//! connect to an endpoint that is already tearing down yields an empty
//! [`crate::Connection`]. [`SignalError`] covers everything around the core
//! that can fail at runtime.

/// Recoverable error enum for the crate.
///
/// # Error Code Ranges
///
/// | Range     | Category      |
/// |-----------|---------------|
/// | 1000–1999 | Configuration |
/// | 2000–2999 | Harness       |
/// | 3000–3999 | Internal      |
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// A configuration value is missing, malformed or out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stress scenario did not finish before its watchdog fired.
    #[error("scenario `{scenario}` did not finish within {timeout_ms} ms")]
    WatchdogTimeout {
        /// Name of the scenario that stalled.
        scenario: String,
        /// Watchdog budget that elapsed.
        timeout_ms: u64,
    },

    /// A harness worker panicked or was cancelled.
    #[error("worker failed: {0}")]
    WorkerFailed(String),

    /// Connection accounting did not balance after a scenario.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    /// A report could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SignalError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidConfig(_) => 1001,
            Self::WatchdogTimeout { .. } => 2001,
            Self::WorkerFailed(_) => 2002,
            Self::InvariantViolated(_) => 3001,
            Self::Serialization(_) => 3002,
        }
    }

    /// Returns `true` if the error points at a registry defect rather than
    /// at the environment it ran in.
    #[must_use]
    pub const fn is_defect(&self) -> bool {
        matches!(
            self,
            Self::WatchdogTimeout { .. } | Self::InvariantViolated(_)
        )
    }
}
