/// CryptoCompare API client
///
/// API Documentation: https://min-api.cryptocompare.com/documentation
///
/// Endpoints implemented:
/// 1. /news/?lang=EN - Latest news feed
/// 2. /histominute, /histohour, /histoday - OHLCV candles against USD
pub mod types;

use self::types::{Envelope, HistoData, NewsItemDto};
use crate::apis::client::{build_url, HttpClient};
use crate::config::CryptoCompareConfig;
use crate::errors::{FetchError, FetchResult};
use crate::logger::{self, LogTag};
use crate::marketdata::types::{NewsArticle, OhlcvPoint};
use serde::de::DeserializeOwned;

pub const PROVIDER: &str = "cryptocompare";

/// Candle granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoEndpoint {
    Minute,
    Hour,
    Day,
}

impl HistoEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            HistoEndpoint::Minute => "histominute",
            HistoEndpoint::Hour => "histohour",
            HistoEndpoint::Day => "histoday",
        }
    }
}

#[derive(Clone)]
pub struct CryptoCompareClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
    enabled: bool,
}

impl CryptoCompareClient {
    pub fn new(config: &CryptoCompareConfig) -> Result<Self, String> {
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
            Err(FetchError::fatal("cryptocompare is disabled in config"))
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        if self.api_key.is_empty() {
            Vec::new()
        } else {
            vec![("authorization", format!("Apikey {}", self.api_key))]
        }
    }

    /// Latest English articles, newest first
    pub async fn news(&self) -> FetchResult<Vec<NewsArticle>> {
        self.ensure_enabled()?;
        let url = build_url(PROVIDER, &self.base_url, "news/", &[("lang", "EN".to_string())])?;

        let envelope: Envelope = self.http.get_json(&url, &self.headers()).await?;
        let items: Vec<NewsItemDto> = open_envelope(envelope)?;
        Ok(items.into_iter().map(NewsItemDto::into_article).collect())
    }

    /// Candles for `symbol` against USD
    pub async fn histo(
        &self,
        endpoint: HistoEndpoint,
        symbol: &str,
        limit: u32,
    ) -> FetchResult<Vec<OhlcvPoint>> {
        self.ensure_enabled()?;
        let url = build_url(
            PROVIDER,
            &self.base_url,
            endpoint.path(),
            &[
                ("fsym", symbol.to_uppercase()),
                ("tsym", "USD".to_string()),
                ("limit", limit.to_string()),
            ],
        )?;

        let envelope: Envelope = self.http.get_json(&url, &self.headers()).await?;
        let histo: HistoData = open_envelope(envelope)?;
        Ok(histo.data.into_iter().map(OhlcvPoint::from).collect())
    }
}

fn open_envelope<T: DeserializeOwned>(envelope: Envelope) -> FetchResult<T> {
    envelope.into_data(PROVIDER).map_err(|e| {
        logger::warning(LogTag::CryptoCompare, &format!("In-body error: {}", e));
        e
    })
}
