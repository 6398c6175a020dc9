//! `[cache]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [cache]
//! sweep_interval_ms = 30000     # How often idle caches are swept
//! grace_period_ms = 60000       # Recently used caches are never swept
//! idle_timeout_ms = 180000      # Caches idle longer than this are cleared
//! memory_threshold_mib = 512    # Above this RSS, idle caches are shed early
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CachePolicy;

/// Cache sweep settings (serve mode only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub sweep_interval_ms: u64,
    pub grace_period_ms: u64,
    pub idle_timeout_ms: u64,
    pub memory_threshold_mib: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 30_000,
            grace_period_ms: 60_000,
            idle_timeout_ms: 180_000,
            memory_threshold_mib: 512,
        }
    }
}

impl CacheConfig {
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
            grace_period: Duration::from_millis(self.grace_period_ms),
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            memory_threshold: self.memory_threshold_mib.saturating_mul(1024 * 1024),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::cache::CachePolicy;
    use crate::config::test_parse_config;

    #[test]
    fn test_cache_config() {
        let config = test_parse_config("[cache]\nidle_timeout_ms = 90000\nmemory_threshold_mib = 64");
        let policy = config.cache.policy();

        assert_eq!(policy.idle_timeout, Duration::from_secs(90));
        assert_eq!(policy.memory_threshold, 64 * 1024 * 1024);
        assert_eq!(policy.sweep_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_cache_config_defaults_match_policy() {
        let config = test_parse_config("");
        assert_eq!(config.cache.policy(), CachePolicy::default());
    }
}
