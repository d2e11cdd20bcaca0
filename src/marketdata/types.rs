/// Normalized market-data types
///
/// Upstream payloads are converted into these right at the client boundary;
/// the cache and the service layer never see provider DTOs.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coin summary as listed by market endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub id: String,
    /// Upper-cased ticker
    pub symbol: String,
    pub name: String,
    pub image: String,
    pub current_price: f64,
    pub price_change_percentage_24h: f64,
    pub market_cap: f64,
    /// 0 when unranked
    pub market_cap_rank: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Price series for one coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub coin_id: String,
    pub days: u32,
    pub points: Vec<PricePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub coin_id: String,
    pub current_price: f64,
    pub market_cap: f64,
    pub market_cap_rank: u32,
    pub total_volume: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub circulating_supply: f64,
    pub total_supply: f64,
    pub max_supply: Option<f64>,
    pub price_change_percentage_24h: f64,
}

/// Full detail page: summary, description and market stats from one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinDetail {
    pub coin: Coin,
    pub stats: MarketStats,
}

/// Global totals from the `/global` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalMarket {
    pub total_market_cap: f64,
    pub total_volume: f64,
    pub btc_dominance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub total_market_cap: f64,
    pub total_volume: f64,
    pub btc_dominance: f64,
    pub btc_price: f64,
    pub eth_price: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub image_url: String,
    pub source: String,
    pub url: String,
    pub is_featured: bool,
    pub published_at: DateTime<Utc>,
}

/// One candle; `time` is unix seconds, `volume` is quote volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvPoint {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub from_id: String,
    pub to_currency: String,
    pub amount: f64,
    pub rate: f64,
    pub value: f64,
}

/// Direction of a top-movers query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoverDirection {
    Gainers,
    Losers,
}

impl MoverDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoverDirection::Gainers => "gainers",
            MoverDirection::Losers => "losers",
        }
    }

    /// CoinGecko `order` parameter
    pub fn market_order(&self) -> &'static str {
        match self {
            MoverDirection::Gainers => "price_change_percentage_24h_desc",
            MoverDirection::Losers => "price_change_percentage_24h_asc",
        }
    }
}
