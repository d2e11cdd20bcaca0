/// CoinGecko API client
///
/// API Documentation: https://docs.coingecko.com/reference/introduction
///
/// Endpoints implemented:
/// 1. /coins/markets - Ranked market listing, or an explicit id set
/// 2. /coins/{id} - Coin detail with market data and description
/// 3. /coins/{id}/market_chart - Price series over N days
/// 4. /search - Coin search by name/symbol
/// 5. /search/trending - Trending coin ids
/// 6. /global - Global market totals
/// 7. /simple/price - Spot prices for id x currency
pub mod types;

use self::types::{
    CoinDetailDto, GlobalResponse, MarketChartDto, MarketCoinDto, SearchResponse,
    SimplePriceResponse, TrendingResponse,
};
use crate::apis::client::{build_url, path_segment, HttpClient};
use crate::config::CoinGeckoConfig;
use crate::errors::{FetchError, FetchResult};
use crate::marketdata::types::{Coin, CoinDetail, GlobalMarket, PriceHistory};
use crate::logger::{self, LogTag};
use chrono::Utc;
use std::collections::HashMap;

pub const PROVIDER: &str = "coingecko";

/// Default market ordering
pub const ORDER_MARKET_CAP: &str = "market_cap_desc";

#[derive(Clone)]
pub struct CoinGeckoClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
    enabled: bool,
}

impl CoinGeckoClient {
    pub fn new(config: &CoinGeckoConfig) -> Result<Self, String> {
        Ok(Self {
            http: HttpClient::new(PROVIDER, config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            enabled: config.enabled,
        })
    }

    fn ensure_enabled(&self) -> FetchResult<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(FetchError::fatal("coingecko is disabled in config"))
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        if self.api_key.is_empty() {
            Vec::new()
        } else {
            vec![("x-cg-demo-api-key", self.api_key.clone())]
        }
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> FetchResult<String> {
        build_url(PROVIDER, &self.base_url, path, params)
    }

    /// Ranked market listing in USD
    pub async fn markets(&self, page: u32, per_page: u32, order: &str) -> FetchResult<Vec<Coin>> {
        self.ensure_enabled()?;
        let url = self.endpoint(
            "coins/markets",
            &[
                ("vs_currency", "usd".to_string()),
                ("order", order.to_string()),
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
                ("sparkline", "false".to_string()),
                ("price_change_percentage", "24h".to_string()),
            ],
        )?;

        let dtos: Vec<MarketCoinDto> = self.http.get_json(&url, &self.headers()).await?;
        let now = Utc::now();
        Ok(dtos.into_iter().map(|d| d.into_coin(now)).collect())
    }

    /// Market rows for an explicit id set, ordered by market cap
    pub async fn markets_by_ids(&self, ids: &[String]) -> FetchResult<Vec<Coin>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_enabled()?;
        let url = self.endpoint(
            "coins/markets",
            &[
                ("vs_currency", "usd".to_string()),
                ("ids", ids.join(",")),
                ("order", ORDER_MARKET_CAP.to_string()),
                ("sparkline", "false".to_string()),
            ],
        )?;

        let dtos: Vec<MarketCoinDto> = self.http.get_json(&url, &self.headers()).await?;
        let now = Utc::now();
        Ok(dtos.into_iter().map(|d| d.into_coin(now)).collect())
    }

    /// `None` when CoinGecko does not know the id
    pub async fn coin_detail(&self, id: &str) -> FetchResult<Option<CoinDetail>> {
        self.ensure_enabled()?;
        let segment = path_segment(PROVIDER, &id.to_lowercase())?;
        let url = self.endpoint(
            &format!("coins/{}", segment),
            &[
                ("localization", "false".to_string()),
                ("tickers", "false".to_string()),
                ("market_data", "true".to_string()),
                ("community_data", "false".to_string()),
                ("developer_data", "false".to_string()),
                ("sparkline", "false".to_string()),
            ],
        )?;

        let dto: Option<CoinDetailDto> = self
            .http
            .get_json_optional(&url, &self.headers())
            .await?;
        if dto.is_none() {
            logger::debug(LogTag::CoinGecko, &format!("Unknown coin id '{}'", id));
        }
        Ok(dto.map(|d| d.into_detail(Utc::now())))
    }

    pub async fn market_chart(&self, id: &str, days: u32) -> FetchResult<PriceHistory> {
        self.ensure_enabled()?;
        let id = path_segment(PROVIDER, &id.to_lowercase())?;
        let url = self.endpoint(
            &format!("coins/{}/market_chart", id),
            &[
                ("vs_currency", "usd".to_string()),
                ("days", days.to_string()),
            ],
        )?;

        let dto: Option<MarketChartDto> = self
            .http
            .get_json_optional(&url, &self.headers())
            .await?;
        Ok(match dto {
            Some(dto) => dto.into_history(&id, days),
            None => PriceHistory {
                coin_id: id,
                days,
                points: Vec::new(),
            },
        })
    }

    pub async fn search(&self, query: &str) -> FetchResult<Vec<Coin>> {
        self.ensure_enabled()?;
        let url = self.endpoint("search", &[("query", query.to_string())])?;

        let response: SearchResponse = self.http.get_json(&url, &self.headers()).await?;
        let now = Utc::now();
        Ok(response
            .coins
            .into_iter()
            .map(|c| c.into_coin(now))
            .collect())
    }

    pub async fn trending_ids(&self) -> FetchResult<Vec<String>> {
        self.ensure_enabled()?;
        let url = self.endpoint("search/trending", &[])?;
        let response: TrendingResponse = self.http.get_json(&url, &self.headers()).await?;
        Ok(response.ids())
    }

    pub async fn global(&self) -> FetchResult<GlobalMarket> {
        self.ensure_enabled()?;
        let url = self.endpoint("global", &[])?;
        let response: GlobalResponse = self.http.get_json(&url, &self.headers()).await?;
        Ok(response.into_global())
    }

    /// Spot prices; ids or currencies CoinGecko does not know are simply absent
    pub async fn simple_price(
        &self,
        ids: &[String],
        vs_currencies: &[String],
    ) -> FetchResult<HashMap<String, HashMap<String, f64>>> {
        self.ensure_enabled()?;
        let url = self.endpoint(
            "simple/price",
            &[
                ("ids", ids.join(",")),
                ("vs_currencies", vs_currencies.join(",")),
            ],
        )?;

        let response: SimplePriceResponse = self.http.get_json(&url, &self.headers()).await?;
        Ok(response
            .into_iter()
            .map(|(id, prices)| {
                let prices = prices
                    .into_iter()
                    .filter_map(|(currency, price)| price.map(|p| (currency, p)))
                    .collect();
                (id, prices)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;

    fn client(enabled: bool) -> CoinGeckoClient {
        let mut config = CoinGeckoConfig::default();
        config.enabled = enabled;
        config.base_url = "https://api.example.test/v3/".to_string();
        CoinGeckoClient::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_encodes_params() {
        let url = client(true)
            .endpoint("search", &[("query", "shiba inu&x".to_string())])
            .unwrap();
        assert_eq!(url, "https://api.example.test/v3/search?query=shiba+inu%26x");
    }

    #[test]
    fn test_api_key_header_only_when_set() {
        assert!(client(true).headers().is_empty());

        let mut config = CoinGeckoConfig::default();
        config.api_key = "demo-key".to_string();
        let keyed = CoinGeckoClient::new(&config).unwrap();
        assert_eq!(keyed.headers(), vec![("x-cg-demo-api-key", "demo-key".to_string())]);
    }

    #[test]
    fn test_endpoint_without_params_has_no_query() {
        let url = client(true).endpoint("global", &[]).unwrap();
        assert_eq!(url, "https://api.example.test/v3/global");
    }

    #[tokio::test]
    async fn test_disabled_client_fails_fatally() {
        let err = client(false).trending_ids().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Fatal);
    }

    #[tokio::test]
    async fn test_empty_id_set_skips_request() {
        let coins = client(false).markets_by_ids(&[]).await.unwrap();
        assert!(coins.is_empty());
    }

    #[tokio::test]
    async fn test_path_breaking_ids_rejected_before_request() {
        let client = client(true);

        let err = client.coin_detail("../global").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Fatal);

        let err = client.market_chart("btc?x=1", 7).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Fatal);
    }
}
