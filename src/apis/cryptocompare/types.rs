/// CryptoCompare response DTOs
///
/// CryptoCompare reports most failures with HTTP 200 and
/// `{"Response":"Error","Message":...}`, so every payload is first read as an
/// envelope and checked before `Data` is decoded.
use crate::errors::{FetchError, FetchResult};
use crate::marketdata::types::{NewsArticle, OhlcvPoint};
use chrono::{TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Response", default)]
    pub response: Option<String>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
    #[serde(rename = "Data", default)]
    pub data: serde_json::Value,
}

impl Envelope {
    /// Classify in-body errors, then decode `Data`
    pub fn into_data<T: DeserializeOwned>(self, provider: &str) -> FetchResult<T> {
        if self.response.as_deref() == Some("Error") {
            let message = self.message.unwrap_or_else(|| "unknown error".to_string());
            if message.to_lowercase().contains("rate limit") {
                return Err(FetchError::rate_limited(provider));
            }
            return Err(FetchError::fatal(format!("{} error: {}", provider, message)));
        }

        serde_json::from_value(self.data)
            .map_err(|e| FetchError::fatal(format!("{} data could not be decoded: {}", provider, e)))
    }
}

// ============================================================================
// /news/
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewsItemDto {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub imageurl: String,
    #[serde(default)]
    pub published_on: i64,
    #[serde(default)]
    pub source_info: Option<SourceInfoDto>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceInfoDto {
    pub name: String,
}

impl NewsItemDto {
    pub fn into_article(self) -> NewsArticle {
        let source = self
            .source_info
            .map(|info| info.name)
            .or(self.source)
            .unwrap_or_default();

        NewsArticle {
            id: self.id,
            title: self.title,
            summary: self.body.clone(),
            content: self.body,
            image_url: self.imageurl,
            source,
            url: self.url,
            is_featured: false,
            published_at: Utc
                .timestamp_opt(self.published_on, 0)
                .single()
                .unwrap_or_default(),
        }
    }
}

// ============================================================================
// /histominute, /histohour, /histoday
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct HistoData {
    #[serde(rename = "Data", default)]
    pub data: Vec<CandleDto>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CandleDto {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volumeto: f64,
}

impl From<CandleDto> for OhlcvPoint {
    fn from(c: CandleDto) -> Self {
        OhlcvPoint {
            time: c.time,
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volumeto,
        }
    }
}
