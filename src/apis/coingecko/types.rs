/// CoinGecko response DTOs and their normalization
///
/// Fields the free tier sometimes sends as `null` are optional here and
/// default to zero in the domain types.
use crate::marketdata::types::{
    Coin, CoinDetail, GlobalMarket, MarketStats, PriceHistory, PricePoint,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Currency-keyed value map (`{"usd": 1.0, "eur": 0.9}`)
pub type CurrencyMap = HashMap<String, Option<f64>>;

/// `/simple/price` response: id => currency => price
pub type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

fn usd(map: &CurrencyMap) -> f64 {
    map.get("usd").copied().flatten().unwrap_or(0.0)
}

// ============================================================================
// /coins/markets
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MarketCoinDto {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
}

impl MarketCoinDto {
    pub fn into_coin(self, now: DateTime<Utc>) -> Coin {
        Coin {
            id: self.id,
            symbol: self.symbol.to_uppercase(),
            name: self.name,
            image: self.image.unwrap_or_default(),
            current_price: self.current_price.unwrap_or(0.0),
            price_change_percentage_24h: self.price_change_percentage_24h.unwrap_or(0.0),
            market_cap: self.market_cap.unwrap_or(0.0),
            market_cap_rank: self.market_cap_rank.unwrap_or(0),
            description: None,
            last_updated: now,
        }
    }
}

// ============================================================================
// /coins/{id}
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CoinDetailDto {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<DescriptionDto>,
    #[serde(default)]
    pub image: Option<ImageDto>,
    #[serde(default)]
    pub market_data: Option<MarketDataDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescriptionDto {
    #[serde(default)]
    pub en: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageDto {
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketDataDto {
    #[serde(default)]
    pub current_price: CurrencyMap,
    #[serde(default)]
    pub market_cap: CurrencyMap,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub total_volume: CurrencyMap,
    #[serde(default)]
    pub high_24h: CurrencyMap,
    #[serde(default)]
    pub low_24h: CurrencyMap,
    #[serde(default)]
    pub circulating_supply: Option<f64>,
    #[serde(default)]
    pub total_supply: Option<f64>,
    #[serde(default)]
    pub max_supply: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
}

impl CoinDetailDto {
    pub fn into_detail(self, now: DateTime<Utc>) -> CoinDetail {
        let md = self.market_data.unwrap_or_default();
        let image = self
            .image
            .and_then(|img| img.large.or(img.small))
            .unwrap_or_default();
        // Empty descriptions are common for small caps
        let description = self
            .description
            .and_then(|d| d.en)
            .filter(|text| !text.trim().is_empty());

        let stats = MarketStats {
            coin_id: self.id.clone(),
            current_price: usd(&md.current_price),
            market_cap: usd(&md.market_cap),
            market_cap_rank: md.market_cap_rank.unwrap_or(0),
            total_volume: usd(&md.total_volume),
            high_24h: usd(&md.high_24h),
            low_24h: usd(&md.low_24h),
            circulating_supply: md.circulating_supply.unwrap_or(0.0),
            total_supply: md.total_supply.unwrap_or(0.0),
            max_supply: md.max_supply,
            price_change_percentage_24h: md.price_change_percentage_24h.unwrap_or(0.0),
        };

        let coin = Coin {
            id: self.id,
            symbol: self.symbol.to_uppercase(),
            name: self.name,
            image,
            current_price: stats.current_price,
            price_change_percentage_24h: stats.price_change_percentage_24h,
            market_cap: stats.market_cap,
            market_cap_rank: stats.market_cap_rank,
            description,
            last_updated: now,
        };

        CoinDetail { coin, stats }
    }
}

// ============================================================================
// /coins/{id}/market_chart
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MarketChartDto {
    /// `[unix_millis, price]` pairs
    #[serde(default)]
    pub prices: Vec<Vec<f64>>,
}

impl MarketChartDto {
    pub fn into_history(self, coin_id: &str, days: u32) -> PriceHistory {
        let points = self
            .prices
            .into_iter()
            .filter_map(|pair| {
                if pair.len() < 2 {
                    return None;
                }
                let timestamp = Utc.timestamp_millis_opt(pair[0] as i64).single()?;
                Some(PricePoint {
                    timestamp,
                    price: pair[1],
                })
            })
            .collect();

        PriceHistory {
            coin_id: coin_id.to_string(),
            days,
            points,
        }
    }
}

// ============================================================================
// /search and /search/trending
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub coins: Vec<SearchCoinDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchCoinDto {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
}

impl SearchCoinDto {
    pub fn into_coin(self, now: DateTime<Utc>) -> Coin {
        Coin {
            id: self.id,
            symbol: self.symbol.to_uppercase(),
            name: self.name,
            image: self.thumb.unwrap_or_default(),
            current_price: 0.0,
            price_change_percentage_24h: 0.0,
            market_cap: 0.0,
            market_cap_rank: self.market_cap_rank.unwrap_or(0),
            description: None,
            last_updated: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendingResponse {
    #[serde(default)]
    pub coins: Vec<TrendingWrapper>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendingWrapper {
    pub item: TrendingItem,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendingItem {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl TrendingResponse {
    pub fn ids(&self) -> Vec<String> {
        self.coins.iter().map(|w| w.item.id.clone()).collect()
    }
}

// ============================================================================
// /global
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalResponse {
    pub data: GlobalDataDto,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalDataDto {
    #[serde(default)]
    pub total_market_cap: CurrencyMap,
    #[serde(default)]
    pub total_volume: CurrencyMap,
    #[serde(default)]
    pub market_cap_percentage: CurrencyMap,
}

impl GlobalResponse {
    pub fn into_global(self) -> GlobalMarket {
        GlobalMarket {
            total_market_cap: usd(&self.data.total_market_cap),
            total_volume: usd(&self.data.total_volume),
            btc_dominance: self
                .data
                .market_cap_percentage
                .get("btc")
                .copied()
                .flatten()
                .unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_markets_normalization() {
        let json = r#"[
            {"id":"bitcoin","symbol":"btc","name":"Bitcoin","image":"https://img/btc.png",
             "current_price":97000.5,"market_cap":1.9e12,"market_cap_rank":1,
             "price_change_percentage_24h":-1.25},
            {"id":"newcoin","symbol":"new","name":"New","image":null,
             "current_price":null,"market_cap":null,"market_cap_rank":null,
             "price_change_percentage_24h":null}
        ]"#;
        let dtos: Vec<MarketCoinDto> = serde_json::from_str(json).unwrap();
        let coins: Vec<Coin> = dtos.into_iter().map(|d| d.into_coin(now())).collect();

        assert_eq!(coins[0].symbol, "BTC");
        assert_eq!(coins[0].current_price, 97000.5);
        assert_eq!(coins[0].market_cap_rank, 1);
        assert_eq!(coins[0].price_change_percentage_24h, -1.25);

        assert_eq!(coins[1].image, "");
        assert_eq!(coins[1].current_price, 0.0);
        assert_eq!(coins[1].market_cap_rank, 0);
    }

    #[test]
    fn test_detail_normalization() {
        let json = r#"{
            "id":"ethereum","symbol":"eth","name":"Ethereum",
            "description":{"en":"Smart contracts."},
            "image":{"large":"https://img/eth-large.png","small":"https://img/eth-small.png"},
            "market_data":{
                "current_price":{"usd":3500.0,"eur":3200.0},
                "market_cap":{"usd":4.2e11},
                "market_cap_rank":2,
                "total_volume":{"usd":1.5e10},
                "high_24h":{"usd":3600.0},
                "low_24h":{"usd":null},
                "circulating_supply":120000000.0,
                "total_supply":null,
                "max_supply":null,
                "price_change_percentage_24h":2.5
            }
        }"#;
        let detail = serde_json::from_str::<CoinDetailDto>(json)
            .unwrap()
            .into_detail(now());

        assert_eq!(detail.coin.symbol, "ETH");
        assert_eq!(detail.coin.image, "https://img/eth-large.png");
        assert_eq!(detail.coin.description.as_deref(), Some("Smart contracts."));
        assert_eq!(detail.stats.current_price, 3500.0);
        assert_eq!(detail.stats.high_24h, 3600.0);
        assert_eq!(detail.stats.low_24h, 0.0);
        assert_eq!(detail.stats.total_supply, 0.0);
        assert_eq!(detail.stats.max_supply, None);
        assert_eq!(detail.coin.market_cap_rank, 2);
    }

    #[test]
    fn test_detail_blank_description_dropped() {
        let json = r#"{"id":"x","symbol":"x","name":"X","description":{"en":"  "}}"#;
        let detail = serde_json::from_str::<CoinDetailDto>(json)
            .unwrap()
            .into_detail(now());
        assert_eq!(detail.coin.description, None);
        assert_eq!(detail.stats.current_price, 0.0);
    }

    #[test]
    fn test_market_chart_skips_malformed_pairs() {
        let json = r#"{"prices":[[1735689600000,95000.0],[1735693200000],[1735696800000,95500.0]]}"#;
        let history = serde_json::from_str::<MarketChartDto>(json)
            .unwrap()
            .into_history("bitcoin", 1);

        assert_eq!(history.points.len(), 2);
        assert_eq!(history.points[0].timestamp.timestamp(), 1_735_689_600);
        assert_eq!(history.points[1].price, 95500.0);
    }

    #[test]
    fn test_trending_and_global() {
        let trending: TrendingResponse = serde_json::from_str(
            r#"{"coins":[{"item":{"id":"pepe","name":"Pepe","symbol":"PEPE"}},{"item":{"id":"sui"}}]}"#,
        )
        .unwrap();
        assert_eq!(trending.ids(), vec!["pepe".to_string(), "sui".to_string()]);

        let global: GlobalResponse = serde_json::from_str(
            r#"{"data":{"total_market_cap":{"usd":3.4e12},"total_volume":{"usd":1.1e11},
                "market_cap_percentage":{"btc":56.7,"eth":12.1}}}"#,
        )
        .unwrap();
        let global = global.into_global();
        assert_eq!(global.total_market_cap, 3.4e12);
        assert_eq!(global.btc_dominance, 56.7);
    }
}
