/// Configuration schemas - every section defined once with its defaults
use crate::config_struct;
use crate::errors::ConfigError;
use std::time::Duration;

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

config_struct! {
    /// TTL classes and stale-data governance
    pub struct CacheConfig {
        /// Fast-moving lists and prices
        short_ttl_secs: u64 = 120,
        /// Coin details, price history, comparisons
        medium_ttl_secs: u64 = 300,
        /// Search results
        long_ttl_secs: u64 = 600,
        news_ttl_secs: u64 = 900,
        chart_ttl_secs: u64 = 60,
        /// Stale tier retention, must exceed every fresh TTL
        stale_ttl_secs: u64 = 3600,
        /// Serve stale data even when the upstream rejects the request outright
        stale_on_fatal: bool = true,
        /// Background sweep of expired entries (0 = never sweep)
        sweep_interval_secs: u64 = 300,
    }
}

impl CacheConfig {
    pub fn fresh_ttls(&self) -> [(&'static str, u64); 5] {
        [
            ("short_ttl_secs", self.short_ttl_secs),
            ("medium_ttl_secs", self.medium_ttl_secs),
            ("long_ttl_secs", self.long_ttl_secs),
            ("news_ttl_secs", self.news_ttl_secs),
            ("chart_ttl_secs", self.chart_ttl_secs),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, secs) in self.fresh_ttls() {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    field: format!("cache.{}", field),
                    reason: "TTL must be greater than zero".to_string(),
                });
            }
            if secs >= self.stale_ttl_secs {
                return Err(ConfigError::Invalid {
                    field: "cache.stale_ttl_secs".to_string(),
                    reason: format!(
                        "stale retention ({}s) must be longer than {} ({}s)",
                        self.stale_ttl_secs, field, secs
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.sweep_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

// ============================================================================
// RETRY CONFIGURATION
// ============================================================================

config_struct! {
    /// Retry executor tuning shared by all upstreams
    pub struct RetryConfig {
        /// Retries for transient failures (timeouts, resets, 5xx)
        max_retries: u32 = 3,
        base_delay_ms: u64 = 500,
        /// Rate-limited calls back off from a longer base
        rate_limit_base_delay_ms: u64 = 2000,
        max_rate_limit_retries: u32 = 5,
        /// Ceiling for any single backoff delay
        max_delay_ms: u64 = 30_000,
        /// Fraction of the delay added as random jitter (0.0 - 0.5)
        jitter: f64 = 0.1,
        /// Per-attempt timeout, independent of the overall retry budget
        call_timeout_secs: u64 = 10,
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=0.5).contains(&self.jitter) {
            return Err(ConfigError::Invalid {
                field: "retry.jitter".to_string(),
                reason: format!("{} is outside 0.0 - 0.5", self.jitter),
            });
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::Invalid {
                field: "retry.max_delay_ms".to_string(),
                reason: "must not be smaller than base_delay_ms".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// PROVIDER CONFIGURATION
// ============================================================================

config_struct! {
    /// CoinGecko (shared free-tier quota)
    pub struct CoinGeckoConfig {
        enabled: bool = true,
        base_url: String = "https://api.coingecko.com/api/v3".to_string(),
        /// Demo API key sent as `x-cg-demo-api-key` (empty = none)
        api_key: String = String::new(),
        timeout_secs: u64 = 10,
        /// Serialize every call through one gate slot instead of one per key
        global_serialization: bool = true,
        /// Pause after every upstream call (0 = no pacing)
        pacing_ms: u64 = 1200,
    }
}

config_struct! {
    /// CryptoCompare (news and OHLCV candles)
    pub struct CryptoCompareConfig {
        enabled: bool = true,
        base_url: String = "https://min-api.cryptocompare.com/data/v2".to_string(),
        /// Sent as `authorization: Apikey <key>` (empty = none)
        api_key: String = String::new(),
        timeout_secs: u64 = 10,
        global_serialization: bool = false,
        pacing_ms: u64 = 0,
    }
}

// ============================================================================
// ROOT
// ============================================================================

config_struct! {
    /// Complete marketfeed configuration
    pub struct Config {
        cache: CacheConfig = CacheConfig::default(),
        retry: RetryConfig = RetryConfig::default(),
        coingecko: CoinGeckoConfig = CoinGeckoConfig::default(),
        cryptocompare: CryptoCompareConfig = CryptoCompareConfig::default(),
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_stale_must_outlive_fresh() {
        let mut config = Config::default();
        config.cache.news_ttl_secs = 3600;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("stale_ttl_secs"));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = Config::default();
        config.cache.chart_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_jitter_bounds() {
        let mut config = Config::default();
        config.retry.jitter = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            short_ttl_secs = 30

            [coingecko]
            pacing_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.short_ttl_secs, 30);
        assert_eq!(config.cache.stale_ttl_secs, 3600);
        assert_eq!(config.coingecko.pacing_ms, 0);
        assert!(config.coingecko.global_serialization);
        assert_eq!(config.retry.max_retries, 3);
    }
}
