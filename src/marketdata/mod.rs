//! Market data operations served through the read-through cache

pub mod mapping;
pub mod service;
pub mod types;

pub use service::MarketDataService;
pub use types::{
    Coin, CoinDetail, Conversion, GlobalMarket, MarketOverview, MarketStats, MoverDirection,
    NewsArticle, OhlcvPoint, PriceHistory, PricePoint,
};
