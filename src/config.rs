//! Registry configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every key has a default, so an empty
//! environment yields a usable configuration.

use crate::error::SignalError;

/// Top-level registry configuration.
///
/// Loaded once at startup via [`RegistryConfig::from_env`] and handed to
/// [`crate::Context::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Number of lock-domain ids a thread reserves from the shared counter
    /// at a time.
    pub id_block_size: u64,

    /// Verify twin back-references whenever a connection is destroyed.
    pub verify_pairing: bool,

    /// Worker threads per stress scenario.
    pub stress_threads: usize,

    /// Iterations each stress worker performs.
    pub stress_iterations: usize,

    /// Milliseconds a stress scenario may run before the watchdog fails it.
    pub watchdog_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            id_block_size: 64,
            verify_pairing: cfg!(debug_assertions),
            stress_threads: 4,
            stress_iterations: 2_000,
            watchdog_timeout_ms: 10_000,
        }
    }
}

impl RegistryConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidConfig`] if a variable is set but
    /// cannot be parsed, or if the resulting configuration is out of range.
    pub fn from_env() -> Result<Self, SignalError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`RegistryConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SignalError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            id_block_size: parse_var(&lookup, "SIGNALS_ID_BLOCK_SIZE", defaults.id_block_size)?,
            verify_pairing: parse_bool(&lookup, "SIGNALS_VERIFY_PAIRING", defaults.verify_pairing)?,
            stress_threads: parse_var(&lookup, "STRESS_THREADS", defaults.stress_threads)?,
            stress_iterations: parse_var(&lookup, "STRESS_ITERATIONS", defaults.stress_iterations)?,
            watchdog_timeout_ms: parse_var(
                &lookup,
                "STRESS_WATCHDOG_MS",
                defaults.watchdog_timeout_ms,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidConfig`] naming the first offending key.
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.id_block_size == 0 {
            return Err(SignalError::InvalidConfig(
                "SIGNALS_ID_BLOCK_SIZE must be at least 1".to_string(),
            ));
        }
        if self.stress_threads < 2 {
            return Err(SignalError::InvalidConfig(
                "STRESS_THREADS must be at least 2".to_string(),
            ));
        }
        if self.stress_iterations == 0 {
            return Err(SignalError::InvalidConfig(
                "STRESS_ITERATIONS must be at least 1".to_string(),
            ));
        }
        if self.watchdog_timeout_ms == 0 {
            return Err(SignalError::InvalidConfig(
                "STRESS_WATCHDOG_MS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parses `key` as `T`, returning `default` when it is not set.
fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, SignalError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| SignalError::InvalidConfig(format!("{key}: cannot parse `{raw}`"))),
    }
}

/// Parses `key` as a boolean. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive).
fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, SignalError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(SignalError::InvalidConfig(format!(
            "{key}: expected a boolean, got `{raw}`"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let Ok(config) = RegistryConfig::from_lookup(|_| None) else {
            panic!("defaults must validate");
        };
        assert_eq!(config, RegistryConfig::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let lookup = lookup_from(&[
            ("SIGNALS_ID_BLOCK_SIZE", "8"),
            ("SIGNALS_VERIFY_PAIRING", "TRUE"),
            ("STRESS_THREADS", " 6 "),
            ("STRESS_ITERATIONS", "10"),
            ("STRESS_WATCHDOG_MS", "1500"),
        ]);
        let Ok(config) = RegistryConfig::from_lookup(lookup) else {
            panic!("valid overrides");
        };
        assert_eq!(config.id_block_size, 8);
        assert!(config.verify_pairing);
        assert_eq!(config.stress_threads, 6);
        assert_eq!(config.stress_iterations, 10);
        assert_eq!(config.watchdog_timeout_ms, 1500);
    }

    #[test]
    fn malformed_number_is_rejected() {
        let result = RegistryConfig::from_lookup(lookup_from(&[("STRESS_THREADS", "many")]));
        let Err(SignalError::InvalidConfig(message)) = result else {
            panic!("expected InvalidConfig");
        };
        assert!(message.starts_with("STRESS_THREADS"));
    }

    #[test]
    fn malformed_bool_is_rejected() {
        let result =
            RegistryConfig::from_lookup(lookup_from(&[("SIGNALS_VERIFY_PAIRING", "maybe")]));
        assert!(matches!(result, Err(SignalError::InvalidConfig(_))));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for (key, value) in [
            ("SIGNALS_ID_BLOCK_SIZE", "0"),
            ("STRESS_THREADS", "1"),
            ("STRESS_ITERATIONS", "0"),
            ("STRESS_WATCHDOG_MS", "0"),
        ] {
            let result = RegistryConfig::from_lookup(lookup_from(&[(key, value)]));
            let Err(SignalError::InvalidConfig(message)) = result else {
                panic!("{key}={value} should be rejected");
            };
            assert!(message.starts_with(key));
        }
    }
}
