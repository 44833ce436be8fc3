//! Engine configuration.

use serde::Deserialize;
use std::time::Duration;

use crate::gateway::RetryPolicy;

/// Upper bound on read attempts, whatever the config says.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Configuration for the offer engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Freshness window for cached offer lists. `0` makes every entry stale.
    #[serde(default = "defaults::cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Serve stale entries immediately and revalidate in the background.
    #[serde(default = "defaults::swr_enabled")]
    pub swr_enabled: bool,

    #[serde(default = "defaults::retry_max_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "defaults::retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "defaults::quantity_ceiling")]
    pub quantity_ceiling: u64,

    #[serde(default = "defaults::backend_url")]
    pub backend_url: String,

    #[serde(default)]
    pub backend_api_key: Option<String>,

    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Table (or view) queried when the list procedure is missing.
    #[serde(default = "defaults::offers_table")]
    pub offers_table: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: defaults::cache_ttl_ms(),
            swr_enabled: defaults::swr_enabled(),
            retry_max_attempts: defaults::retry_max_attempts(),
            retry_base_delay_ms: defaults::retry_base_delay_ms(),
            quantity_ceiling: defaults::quantity_ceiling(),
            backend_url: defaults::backend_url(),
            backend_api_key: None,
            request_timeout_secs: defaults::request_timeout_secs(),
            offers_table: defaults::offers_table(),
        }
    }
}

impl EngineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts.clamp(1, MAX_RETRY_ATTEMPTS),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

mod defaults {
    pub fn cache_ttl_ms() -> u64 {
        60_000
    }

    pub fn swr_enabled() -> bool {
        true
    }

    pub fn retry_max_attempts() -> u32 {
        3
    }

    pub fn retry_base_delay_ms() -> u64 {
        100
    }

    pub fn quantity_ceiling() -> u64 {
        offer_types::QUANTITY_CEILING
    }

    pub fn backend_url() -> String {
        std::env::var("SUPABASE_URL").unwrap_or_else(|_| "http://localhost:54321".into())
    }

    pub fn request_timeout_secs() -> u64 {
        10
    }

    pub fn offers_table() -> String {
        "offers_with_details".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert!(config.swr_enabled);
        assert_eq!(config.quantity_ceiling, 1_000_000);
        assert_eq!(config.offers_table, "offers_with_details");
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "cache_ttl_ms": 0, "retry_max_attempts": 0 }"#).unwrap();
        assert_eq!(config.cache_ttl(), Duration::ZERO);
        assert_eq!(config.retry_policy().max_attempts, 1);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(config.backend_api_key.is_none());
    }

    #[test]
    fn test_retry_attempts_are_capped() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "retry_max_attempts": 80 }"#).unwrap();
        assert_eq!(config.retry_policy().max_attempts, MAX_RETRY_ATTEMPTS);
    }
}
