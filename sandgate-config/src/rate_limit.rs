use crate::constants::defaults;
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed-window throttling per client address.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    #[serde(default = "RateLimitConfig::default_window_secs")]
    pub window_secs: u64,
    /// Requests admitted per window; the next one is rejected.
    #[serde(default = "RateLimitConfig::default_max_requests")]
    pub max_requests: u32,
    /// How often expired entries are dropped.
    #[serde(default = "RateLimitConfig::default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Key clients by the first `X-Forwarded-For` hop. Only enable behind a
    /// proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: Self::default_window_secs(),
            max_requests: Self::default_max_requests(),
            sweep_interval_secs: Self::default_sweep_interval_secs(),
            trust_forwarded_for: false,
        }
    }
}

impl RateLimitConfig {
    const fn default_window_secs() -> u64 {
        defaults::DEFAULT_RATE_WINDOW_SECS
    }

    const fn default_max_requests() -> u32 {
        defaults::DEFAULT_RATE_MAX_REQUESTS
    }

    const fn default_sweep_interval_secs() -> u64 {
        defaults::DEFAULT_RATE_SWEEP_INTERVAL_SECS
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.window_secs > 0, "rate_limit.window_secs must be at least 1");
        ensure!(
            self.window_secs <= defaults::MAX_RATE_WINDOW_SECS,
            "rate_limit.window_secs must be at most {}, got {}",
            defaults::MAX_RATE_WINDOW_SECS,
            self.window_secs
        );
        ensure!(
            self.max_requests > 0,
            "rate_limit.max_requests must be at least 1"
        );
        ensure!(
            self.sweep_interval_secs > 0,
            "rate_limit.sweep_interval_secs must be at least 1"
        );
        ensure!(
            self.sweep_interval_secs <= defaults::MAX_RATE_WINDOW_SECS,
            "rate_limit.sweep_interval_secs must be at most {}, got {}",
            defaults::MAX_RATE_WINDOW_SECS,
            self.sweep_interval_secs
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_windows_are_rejected() {
        let config = RateLimitConfig {
            window_secs: 9_223_372_036_854_775_807,
            ..RateLimitConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("rate_limit.window_secs must be at most"));

        let config = RateLimitConfig {
            sweep_interval_secs: u64::MAX,
            ..RateLimitConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn one_day_window_is_accepted() {
        let config = RateLimitConfig {
            window_secs: defaults::MAX_RATE_WINDOW_SECS,
            ..RateLimitConfig::default()
        };
        config.validate().unwrap();
    }
}
