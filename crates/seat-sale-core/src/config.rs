//! Configuration of the seat sales system

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::ConfigError;

/// Configuration of the seat sales system
#[derive(Clone, Copy, PartialEq, Eq, Deserialize, Debug)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Milliseconds between two background refreshes of the cache
    pub refresh_interval_ms: u64,
    /// Milliseconds the refresh window reaches back before the watermark
    ///
    /// Must cover the clock and replication skew between this process and the
    /// store.
    pub safety_skew_ms: u64,
    /// Refreshes starting less than this many milliseconds after the watermark
    /// are skipped
    pub refresh_debounce_ms: u64,
    /// Attempts a reservation or cancellation makes before giving up
    pub max_attempts: u32,
    /// Default deadline of a reservation or cancellation, 0 for none
    pub request_timeout_ms: u64,
    /// Number of threads executing reservations and cancellations
    pub allocator_threads: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 100,
            safety_skew_ms: 2_000,
            refresh_debounce_ms: 0,
            max_attempts: 20,
            request_timeout_ms: 0,
            allocator_threads: 8,
        }
    }
}

impl Config {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load the TOML file at `path` and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `SEAT_SALE_*` environment variables
    ///
    /// E.g., `SEAT_SALE_SAFETY_SKEW_MS=500` sets [`Self::safety_skew_ms`].
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(std::env::vars())
    }

    fn apply_vars(
        &mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), ConfigError> {
        for (key, value) in vars {
            let Some(field) = key.strip_prefix("SEAT_SALE_") else {
                continue;
            };
            let invalid = || ConfigError::Env {
                key: key.clone(),
                value: value.clone(),
            };
            match field {
                "REFRESH_INTERVAL_MS" => {
                    self.refresh_interval_ms = value.parse().map_err(|_| invalid())?
                }
                "SAFETY_SKEW_MS" => self.safety_skew_ms = value.parse().map_err(|_| invalid())?,
                "REFRESH_DEBOUNCE_MS" => {
                    self.refresh_debounce_ms = value.parse().map_err(|_| invalid())?
                }
                "MAX_ATTEMPTS" => self.max_attempts = value.parse().map_err(|_| invalid())?,
                "REQUEST_TIMEOUT_MS" => {
                    self.request_timeout_ms = value.parse().map_err(|_| invalid())?
                }
                "ALLOCATOR_THREADS" => {
                    self.allocator_threads = value.parse().map_err(|_| invalid())?
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Cadence of the background refresh
    #[inline]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Backward margin of the refresh window
    #[inline]
    pub fn safety_skew(&self) -> Duration {
        Duration::from_millis(self.safety_skew_ms)
    }

    /// Minimum distance between the watermark and a refresh that is executed
    #[inline]
    pub fn refresh_debounce(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }

    /// Default deadline of seat operations
    #[inline]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml_str("safety-skew-ms = 500\nmax-attempts = 3\n").unwrap();
        assert_eq!(config.safety_skew(), Duration::from_millis(500));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.refresh_interval(), Duration::from_millis(100));
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn env_overrides_fields() {
        let mut config = Config::default();
        config
            .apply_vars([
                ("SEAT_SALE_ALLOCATOR_THREADS".to_owned(), "2".to_owned()),
                ("SEAT_SALE_REQUEST_TIMEOUT_MS".to_owned(), "250".to_owned()),
                ("PATH".to_owned(), "/bin".to_owned()),
            ])
            .unwrap();
        assert_eq!(config.allocator_threads, 2);
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn env_override_must_parse() {
        let mut config = Config::default();
        let err = config
            .apply_vars([("SEAT_SALE_MAX_ATTEMPTS".to_owned(), "many".to_owned())])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));
    }
}
