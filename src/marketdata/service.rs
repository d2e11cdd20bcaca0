/// Market-data service
///
/// Binds every logical operation to a cache key, a TTL policy and an upstream
/// profile. All reads go through the injected `ReadThroughCache`; the service
/// owns no cache state of its own.
use super::mapping::{
    clamp_per_page, days_for_period, mark_featured, ohlcv_window, paginate, symbol_for_id,
};
use super::types::{
    Coin, Conversion, MarketOverview, MarketStats, MoverDirection, NewsArticle, OhlcvPoint,
    PriceHistory,
};
use crate::apis::coingecko::{self, CoinGeckoClient, ORDER_MARKET_CAP};
use crate::apis::cryptocompare::{self, CryptoCompareClient};
use crate::cache::{
    normalize_list, CacheKey, CacheRead, Freshness, ReadThroughCache, RetryPolicy, Throttle,
    TtlPolicy, TtlSettings, Upstream,
};
use crate::config::Config;
use crate::errors::{CacheResult, FetchResult};
use crate::logger::{self, LogTag};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;

const FEATURED_COUNT: u32 = 5;
const NEWS_LOOKUP_WINDOW: u32 = 50;

pub struct MarketDataService {
    cache: ReadThroughCache,
    ttl: TtlSettings,
    coingecko: CoinGeckoClient,
    cryptocompare: CryptoCompareClient,
    coingecko_upstream: Arc<Upstream>,
    cryptocompare_upstream: Arc<Upstream>,
}

impl MarketDataService {
    /// Build clients, upstream profiles and a new cache from config
    pub fn from_config(config: &Config) -> Result<Self, String> {
        let retry = RetryPolicy::from_config(&config.retry);

        let mut coingecko_upstream = Upstream::new(coingecko::PROVIDER, retry.clone())
            .with_throttle(Throttle::from_millis(coingecko::PROVIDER, config.coingecko.pacing_ms));
        if config.coingecko.global_serialization {
            coingecko_upstream = coingecko_upstream.globally_serialized();
        }

        let mut cryptocompare_upstream = Upstream::new(cryptocompare::PROVIDER, retry)
            .with_throttle(Throttle::from_millis(
                cryptocompare::PROVIDER,
                config.cryptocompare.pacing_ms,
            ));
        if config.cryptocompare.global_serialization {
            cryptocompare_upstream = cryptocompare_upstream.globally_serialized();
        }

        Ok(Self::new(
            ReadThroughCache::new(config.cache.stale_on_fatal),
            TtlSettings::from_config(&config.cache),
            CoinGeckoClient::new(&config.coingecko)?,
            CryptoCompareClient::new(&config.cryptocompare)?,
            coingecko_upstream,
            cryptocompare_upstream,
        ))
    }

    pub fn new(
        cache: ReadThroughCache,
        ttl: TtlSettings,
        coingecko: CoinGeckoClient,
        cryptocompare: CryptoCompareClient,
        coingecko_upstream: Upstream,
        cryptocompare_upstream: Upstream,
    ) -> Self {
        logger::debug(
            LogTag::Market,
            &format!(
                "Market data service ready (coingecko scope {:?}, cryptocompare scope {:?})",
                coingecko_upstream.scope, cryptocompare_upstream.scope
            ),
        );
        Self {
            cache,
            ttl,
            coingecko,
            cryptocompare,
            coingecko_upstream: Arc::new(coingecko_upstream),
            cryptocompare_upstream: Arc::new(cryptocompare_upstream),
        }
    }

    pub fn cache(&self) -> &ReadThroughCache {
        &self.cache
    }

    async fn read<T, F, Fut>(
        &self,
        key: CacheKey,
        policy: TtlPolicy,
        upstream: &Arc<Upstream>,
        fetch: F,
    ) -> CacheResult<CacheRead<T>>
    where
        T: Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        self.cache
            .get(
                key.as_str(),
                self.ttl.fresh(policy),
                self.ttl.stale(),
                upstream,
                fetch,
            )
            .await
    }

    // =========================================================================
    // COINS
    // =========================================================================

    pub async fn coins(&self, page: u32, per_page: u32) -> CacheResult<CacheRead<Vec<Coin>>> {
        let page = page.max(1);
        let per_page = clamp_per_page(per_page);
        let key = CacheKey::new("coins_list")
            .arg("page", page)
            .arg("per_page", per_page);

        let client = self.coingecko.clone();
        self.read(key, TtlPolicy::Short, &self.coingecko_upstream, move || {
            let client = client.clone();
            async move { client.markets(page, per_page, ORDER_MARKET_CAP).await }
        })
        .await
    }

    pub async fn live_coins(&self, per_page: u32) -> CacheResult<CacheRead<Vec<Coin>>> {
        self.coins(1, per_page).await
    }

    /// Coin summary without description; `None` for unknown ids
    pub async fn coin(&self, id: &str) -> CacheResult<CacheRead<Option<Coin>>> {
        let key = CacheKey::new("coin_basic").arg("id", id);
        let id = id.trim().to_lowercase();

        let client = self.coingecko.clone();
        self.read(key, TtlPolicy::Short, &self.coingecko_upstream, move || {
            let client = client.clone();
            let id = id.clone();
            async move {
                let detail = client.coin_detail(&id).await?;
                Ok(detail.map(|d| Coin {
                    description: None,
                    ..d.coin
                }))
            }
        })
        .await
    }

    /// Coin summary including its description
    pub async fn coin_details(&self, id: &str) -> CacheResult<CacheRead<Option<Coin>>> {
        let key = CacheKey::new("coin_details").arg("id", id);
        let id = id.trim().to_lowercase();

        let client = self.coingecko.clone();
        self.read(key, TtlPolicy::Medium, &self.coingecko_upstream, move || {
            let client = client.clone();
            let id = id.clone();
            async move { Ok(client.coin_detail(&id).await?.map(|d| d.coin)) }
        })
        .await
    }

    pub async fn market_stats(&self, id: &str) -> CacheResult<CacheRead<Option<MarketStats>>> {
        let key = CacheKey::new("market_stats").arg("id", id);
        let id = id.trim().to_lowercase();

        let client = self.coingecko.clone();
        self.read(key, TtlPolicy::Short, &self.coingecko_upstream, move || {
            let client = client.clone();
            let id = id.clone();
            async move { Ok(client.coin_detail(&id).await?.map(|d| d.stats)) }
        })
        .await
    }

    pub async fn price_history(&self, id: &str, days: u32) -> CacheResult<CacheRead<PriceHistory>> {
        let days = days.max(1);
        let key = CacheKey::new("price_history").arg("days", days).arg("id", id);
        let id = id.trim().to_lowercase();

        let client = self.coingecko.clone();
        self.read(key, TtlPolicy::Medium, &self.coingecko_upstream, move || {
            let client = client.clone();
            let id = id.clone();
            async move { client.market_chart(&id, days).await }
        })
        .await
    }

    pub async fn price_history_by_period(
        &self,
        id: &str,
        period: &str,
    ) -> CacheResult<CacheRead<PriceHistory>> {
        self.price_history(id, days_for_period(period)).await
    }

    pub async fn search(&self, query: &str) -> CacheResult<CacheRead<Vec<Coin>>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(CacheRead::new(Arc::new(Vec::new()), Freshness::Fresh));
        }
        let key = CacheKey::new("search").arg("query", &query);

        let client = self.coingecko.clone();
        self.read(key, TtlPolicy::Long, &self.coingecko_upstream, move || {
            let client = client.clone();
            let query = query.clone();
            async move { client.search(&query).await }
        })
        .await
    }

    /// Trending ids resolved to full market rows
    pub async fn trending(&self) -> CacheResult<CacheRead<Vec<Coin>>> {
        let client = self.coingecko.clone();
        self.read(
            CacheKey::new("trending"),
            TtlPolicy::Short,
            &self.coingecko_upstream,
            move || {
                let client = client.clone();
                async move {
                    let ids = client.trending_ids().await?;
                    client.markets_by_ids(&ids).await
                }
            },
        )
        .await
    }

    // =========================================================================
    // MARKET
    // =========================================================================

    pub async fn market_overview(&self) -> CacheResult<CacheRead<MarketOverview>> {
        let client = self.coingecko.clone();
        self.read(
            CacheKey::new("market_overview"),
            TtlPolicy::Short,
            &self.coingecko_upstream,
            move || {
                let client = client.clone();
                async move {
                    let ids = ["bitcoin".to_string(), "ethereum".to_string()];
                    let vs = ["usd".to_string()];
                    let (global, prices) =
                        futures::try_join!(client.global(), client.simple_price(&ids, &vs))?;
                    let usd = |id: &str| {
                        prices
                            .get(id)
                            .and_then(|p| p.get("usd"))
                            .copied()
                            .unwrap_or(0.0)
                    };

                    Ok(MarketOverview {
                        total_market_cap: global.total_market_cap,
                        total_volume: global.total_volume,
                        btc_dominance: global.btc_dominance,
                        btc_price: usd("bitcoin"),
                        eth_price: usd("ethereum"),
                        timestamp: Utc::now(),
                    })
                }
            },
        )
        .await
    }

    pub async fn top_gainers(&self, limit: u32) -> CacheResult<CacheRead<Vec<Coin>>> {
        self.top_movers(MoverDirection::Gainers, limit).await
    }

    pub async fn top_losers(&self, limit: u32) -> CacheResult<CacheRead<Vec<Coin>>> {
        self.top_movers(MoverDirection::Losers, limit).await
    }

    async fn top_movers(
        &self,
        direction: MoverDirection,
        limit: u32,
    ) -> CacheResult<CacheRead<Vec<Coin>>> {
        let limit = clamp_per_page(limit);
        let key = CacheKey::new("top_movers")
            .arg("direction", direction.as_str())
            .arg("limit", limit);

        let client = self.coingecko.clone();
        self.read(key, TtlPolicy::Short, &self.coingecko_upstream, move || {
            let client = client.clone();
            async move { client.markets(1, limit, direction.market_order()).await }
        })
        .await
    }

    // =========================================================================
    // NEWS
    // =========================================================================

    pub async fn news(&self, page: u32, limit: u32) -> CacheResult<CacheRead<Vec<NewsArticle>>> {
        let page = page.max(1);
        let limit = limit.max(1);
        let key = CacheKey::new("news").arg("limit", limit).arg("page", page);
        logger::debug(LogTag::News, &format!("News page {} (limit {})", page, limit));

        let client = self.cryptocompare.clone();
        self.read(key, TtlPolicy::News, &self.cryptocompare_upstream, move || {
            let client = client.clone();
            async move {
                let articles = client.news().await?;
                Ok(paginate(&articles, page, limit))
            }
        })
        .await
    }

    pub async fn featured_news(&self) -> CacheResult<CacheRead<Vec<NewsArticle>>> {
        let read = self.news(1, FEATURED_COUNT).await?;
        Ok(read.map(|articles| mark_featured(articles)))
    }

    /// Looks the article up in the most recent window of the feed
    pub async fn news_by_id(&self, id: &str) -> CacheResult<CacheRead<Option<NewsArticle>>> {
        let read = self.news(1, NEWS_LOOKUP_WINDOW).await?;
        let id = id.trim();
        Ok(read.map(|articles| articles.iter().find(|a| a.id == id).cloned()))
    }

    // =========================================================================
    // CHARTS
    // =========================================================================

    pub async fn ohlcv(&self, coin_id: &str, period: &str) -> CacheResult<CacheRead<Vec<OhlcvPoint>>> {
        let symbol = symbol_for_id(coin_id);
        let (endpoint, limit) = ohlcv_window(period);
        let key = CacheKey::new("ohlcv")
            .arg("period", period)
            .arg("symbol", &symbol);

        logger::debug(
            LogTag::Charts,
            &format!("{} candles for {} ({} x{})", period, symbol, endpoint.path(), limit),
        );

        let client = self.cryptocompare.clone();
        self.read(key, TtlPolicy::Chart, &self.cryptocompare_upstream, move || {
            let client = client.clone();
            let symbol = symbol.clone();
            async move { client.histo(endpoint, &symbol, limit).await }
        })
        .await
    }

    // =========================================================================
    // TOOLS
    // =========================================================================

    /// Price `amount` of `from_id` in `to_currency`
    ///
    /// Only the unit price is cached, so every amount shares one entry.
    /// `None` when CoinGecko has no price for the pair.
    pub async fn convert(
        &self,
        from_id: &str,
        to_currency: &str,
        amount: f64,
    ) -> CacheResult<CacheRead<Option<Conversion>>> {
        let from_id = from_id.trim().to_lowercase();
        let to_currency = to_currency.trim().to_lowercase();
        let key = CacheKey::new("simple_price")
            .arg("id", &from_id)
            .arg("vs", &to_currency);

        let client = self.coingecko.clone();
        let (id, vs) = (from_id.clone(), to_currency.clone());
        let rate: CacheRead<Option<f64>> = self
            .read(key, TtlPolicy::Short, &self.coingecko_upstream, move || {
                let client = client.clone();
                let (id, vs) = (id.clone(), vs.clone());
                async move {
                    let prices = client
                        .simple_price(std::slice::from_ref(&id), std::slice::from_ref(&vs))
                        .await?;
                    Ok(prices.get(&id).and_then(|p| p.get(&vs)).copied())
                }
            })
            .await?;

        Ok(rate.map(|price| {
            price.map(|rate| Conversion {
                from_id,
                to_currency,
                amount,
                rate,
                value: rate * amount,
            })
        }))
    }

    /// Market rows for a comma separated id list
    ///
    /// Ids are trimmed, lower-cased and de-duplicated; an empty list returns
    /// an empty result without touching upstream.
    pub async fn compare(&self, ids: &str) -> CacheResult<CacheRead<Vec<Coin>>> {
        let ids = normalize_list(ids);
        if ids.is_empty() {
            return Ok(CacheRead::new(Arc::new(Vec::new()), Freshness::Fresh));
        }
        let key = CacheKey::new("compare").list_arg("ids", &ids.join(","));

        let client = self.coingecko.clone();
        self.read(key, TtlPolicy::Medium, &self.coingecko_upstream, move || {
            let client = client.clone();
            let ids = ids.clone();
            async move { client.markets_by_ids(&ids).await }
        })
        .await
    }
}
