/// Base HTTP client shared by all upstream providers
///
/// Every response is classified into a `FetchError` here so the retry
/// executor never has to look at HTTP details:
/// - 429 => RateLimited (with `Retry-After` when sent)
/// - 408, 5xx, timeouts, connection failures => Transient
/// - other 4xx, undecodable bodies => Fatal
use crate::errors::{FetchError, FetchResult};
use crate::logger::{self, LogTag};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

const USER_AGENT: &str = concat!("marketfeed/", env!("CARGO_PKG_VERSION"));

/// HTTP client wrapper with timeout and failure classification
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    provider: String,
}

impl HttpClient {
    pub fn new(provider: &str, timeout_secs: u64) -> Result<Self, String> {
        if timeout_secs == 0 {
            return Err("Timeout must be greater than zero".to_string());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            provider: provider.to_string(),
        })
    }

    /// GET `url` and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> FetchResult<T> {
        match self.get_json_optional(url, headers).await? {
            Some(value) => Ok(value),
            None => Err(FetchError::fatal(format!(
                "{} returned HTTP 404 for {}",
                self.provider, url
            ))),
        }
    }

    /// Like `get_json`, but a 404 is a legitimate "does not exist" (`None`)
    pub async fn get_json_optional<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> FetchResult<Option<T>> {
        let start = Instant::now();

        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/json");
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&self.provider, &e))?;

        let status = response.status();
        logger::debug(
            LogTag::Api,
            &format!(
                "{} GET {} -> {} in {}ms",
                self.provider,
                url,
                status.as_u16(),
                start.elapsed().as_millis()
            ),
        );

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if let Some(error) = classify_status(&self.provider, status, response.headers()) {
            return Err(error);
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&self.provider, &e))?;

        decode_json(&self.provider, &body).map(Some)
    }
}

/// `None` for success statuses
pub fn classify_status(provider: &str, status: StatusCode, headers: &HeaderMap) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    let error = if status == StatusCode::TOO_MANY_REQUESTS {
        FetchError::RateLimited {
            provider: provider.to_string(),
            retry_after: parse_retry_after(headers),
        }
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        FetchError::transient(format!("{} returned HTTP {}", provider, status.as_u16()))
    } else {
        FetchError::fatal(format!("{} returned HTTP {}", provider, status.as_u16()))
    };
    Some(error)
}

pub fn classify_reqwest_error(provider: &str, error: &reqwest::Error) -> FetchError {
    if error.is_decode() || error.is_builder() {
        FetchError::fatal(format!("{} request invalid: {}", provider, error))
    } else {
        // Timeouts, connect/reset, truncated bodies
        FetchError::transient(format!("{} request failed: {}", provider, error))
    }
}

/// `Retry-After` as delta seconds; HTTP-date values are ignored
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Validate a caller-supplied id before it is placed in a URL path
///
/// Ids that would change the endpoint (`../global`, `btc?x=1`) are rejected
/// as fatal rather than sent upstream.
pub fn path_segment(provider: &str, raw: &str) -> FetchResult<String> {
    let segment = raw.trim();
    let invalid = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.chars().any(|c| {
            matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control()
        });
    if invalid {
        return Err(FetchError::fatal(format!(
            "invalid {} id '{}'",
            provider, raw
        )));
    }
    Ok(segment.to_string())
}

/// `base/path?params` with form-encoded params
pub fn build_url(provider: &str, base: &str, path: &str, params: &[(&str, String)]) -> FetchResult<String> {
    let url = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let parsed = if params.is_empty() {
        Url::parse(&url)
    } else {
        Url::parse_with_params(&url, params)
    };
    parsed
        .map(String::from)
        .map_err(|e| FetchError::fatal(format!("invalid {} url {}: {}", provider, url, e)))
}

pub fn decode_json<T: DeserializeOwned>(provider: &str, body: &str) -> FetchResult<T> {
    serde_json::from_str(body)
        .map_err(|e| FetchError::fatal(format!("{} response could not be decoded: {}", provider, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_status_classification() {
        let headers = HeaderMap::new();
        let kind = |code: u16| {
            classify_status("coingecko", StatusCode::from_u16(code).unwrap(), &headers)
                .map(|e| e.kind())
        };

        assert_eq!(kind(200), None);
        assert_eq!(kind(429), Some(FailureKind::RateLimited));
        assert_eq!(kind(408), Some(FailureKind::Transient));
        assert_eq!(kind(502), Some(FailureKind::Transient));
        assert_eq!(kind(503), Some(FailureKind::Transient));
        assert_eq!(kind(400), Some(FailureKind::Fatal));
        assert_eq!(kind(401), Some(FailureKind::Fatal));
    }

    #[test]
    fn test_rate_limit_carries_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));

        let error = classify_status("coingecko", StatusCode::TOO_MANY_REQUESTS, &headers).unwrap();
        assert_eq!(error.retry_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_retry_after_http_date_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_decode_failure_is_fatal() {
        let result: FetchResult<Vec<u32>> = decode_json("coingecko", "<html>oops</html>");
        assert_eq!(result.unwrap_err().kind(), FailureKind::Fatal);

        let ok: Vec<u32> = decode_json("coingecko", "[1,2,3]").unwrap();
        assert_eq!(ok, vec![1, 2, 3]);
    }

    #[test]
    fn test_path_segment_rejects_endpoint_changes() {
        assert_eq!(path_segment("coingecko", " bitcoin ").unwrap(), "bitcoin");
        assert_eq!(path_segment("coingecko", "usd-coin").unwrap(), "usd-coin");

        for bad in ["", "..", "../global", "btc?x=1", "btc#frag", "a/b", "50%2f", "two words"] {
            let err = path_segment("coingecko", bad).unwrap_err();
            assert_eq!(err.kind(), FailureKind::Fatal, "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(HttpClient::new("coingecko", 0).is_err());
    }
}
