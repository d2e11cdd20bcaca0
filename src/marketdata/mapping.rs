/// Request argument mapping shared by the market-data operations
use crate::apis::HistoEndpoint;
use crate::marketdata::types::NewsArticle;

/// Largest page CoinGecko serves from `/coins/markets`
pub const MAX_PER_PAGE: u32 = 250;

/// Chart period (`1h`, `24h`, `7d`, `30d`, `1y`) to CoinGecko `days`
///
/// Unknown periods fall back to a week.
pub fn days_for_period(period: &str) -> u32 {
    match period.trim().to_lowercase().as_str() {
        "1h" | "24h" => 1,
        "7d" => 7,
        "30d" => 30,
        "1y" => 365,
        _ => 7,
    }
}

/// Candle period to CryptoCompare endpoint and candle count
pub fn ohlcv_window(period: &str) -> (HistoEndpoint, u32) {
    match period.trim().to_lowercase().as_str() {
        "1m" => (HistoEndpoint::Minute, 1440),
        "5m" => (HistoEndpoint::Minute, 1000),
        "1h" => (HistoEndpoint::Hour, 720),
        _ => (HistoEndpoint::Day, 500),
    }
}

/// CoinGecko id to CryptoCompare ticker
pub fn symbol_for_id(id: &str) -> String {
    let id = id.trim().to_lowercase();
    match id.as_str() {
        "bitcoin" => "BTC".to_string(),
        "ethereum" => "ETH".to_string(),
        "solana" => "SOL".to_string(),
        "cardano" => "ADA".to_string(),
        "ripple" => "XRP".to_string(),
        _ => id.to_uppercase(),
    }
}

/// 1-based page of `items`
pub fn paginate<T: Clone>(items: &[T], page: u32, limit: u32) -> Vec<T> {
    let page = page.max(1) as usize;
    let limit = limit as usize;
    items
        .iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .cloned()
        .collect()
}

pub fn mark_featured(articles: &[NewsArticle]) -> Vec<NewsArticle> {
    articles
        .iter()
        .cloned()
        .map(|mut article| {
            article.is_featured = true;
            article
        })
        .collect()
}

pub fn clamp_per_page(per_page: u32) -> u32 {
    per_page.clamp(1, MAX_PER_PAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_for_period() {
        assert_eq!(days_for_period("1h"), 1);
        assert_eq!(days_for_period("24H"), 1);
        assert_eq!(days_for_period("7d"), 7);
        assert_eq!(days_for_period("30d"), 30);
        assert_eq!(days_for_period("1y"), 365);
        assert_eq!(days_for_period("max"), 7);
    }

    #[test]
    fn test_ohlcv_window() {
        assert_eq!(ohlcv_window("1m"), (HistoEndpoint::Minute, 1440));
        assert_eq!(ohlcv_window("5m"), (HistoEndpoint::Minute, 1000));
        assert_eq!(ohlcv_window("1h"), (HistoEndpoint::Hour, 720));
        assert_eq!(ohlcv_window("1d"), (HistoEndpoint::Day, 500));
        assert_eq!(ohlcv_window("weird"), (HistoEndpoint::Day, 500));
    }

    #[test]
    fn test_symbol_for_id() {
        assert_eq!(symbol_for_id("Bitcoin"), "BTC");
        assert_eq!(symbol_for_id("ripple"), "XRP");
        assert_eq!(symbol_for_id("dogecoin"), "DOGECOIN");
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (1..=12).collect();
        assert_eq!(paginate(&items, 1, 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(paginate(&items, 3, 5), vec![11, 12]);
        assert!(paginate(&items, 4, 5).is_empty());
        assert_eq!(paginate(&items, 0, 2), vec![1, 2]);
    }

    #[test]
    fn test_clamp_per_page() {
        assert_eq!(clamp_per_page(0), 1);
        assert_eq!(clamp_per_page(100), 100);
        assert_eq!(clamp_per_page(1000), 250);
    }
}
