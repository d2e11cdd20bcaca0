/// TTL policies per data class
///
/// Each logical operation is bound to one fresh-tier policy. The stale tier
/// uses a single retention that outlives every fresh policy:
/// - Short: prices, market lists, trending (minutes)
/// - Medium: coin details, price history, comparisons
/// - Long: search results (change rarely)
/// - News: article feeds
/// - Chart: OHLCV candles (cheap upstream, very fast moving)
use crate::config::CacheConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlPolicy {
    Short,
    Medium,
    Long,
    News,
    Chart,
}

impl TtlPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtlPolicy::Short => "short",
            TtlPolicy::Medium => "medium",
            TtlPolicy::Long => "long",
            TtlPolicy::News => "news",
            TtlPolicy::Chart => "chart",
        }
    }
}

/// Resolved durations for every policy
#[derive(Debug, Clone, PartialEq)]
pub struct TtlSettings {
    pub short: Duration,
    pub medium: Duration,
    pub long: Duration,
    pub news: Duration,
    pub chart: Duration,
    pub stale_retention: Duration,
}

impl TtlSettings {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            short: Duration::from_secs(config.short_ttl_secs),
            medium: Duration::from_secs(config.medium_ttl_secs),
            long: Duration::from_secs(config.long_ttl_secs),
            news: Duration::from_secs(config.news_ttl_secs),
            chart: Duration::from_secs(config.chart_ttl_secs),
            stale_retention: Duration::from_secs(config.stale_ttl_secs),
        }
    }

    pub fn fresh(&self, policy: TtlPolicy) -> Duration {
        match policy {
            TtlPolicy::Short => self.short,
            TtlPolicy::Medium => self.medium,
            TtlPolicy::Long => self.long,
            TtlPolicy::News => self.news,
            TtlPolicy::Chart => self.chart,
        }
    }

    pub fn stale(&self) -> Duration {
        self.stale_retention
    }
}

impl Default for TtlSettings {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
