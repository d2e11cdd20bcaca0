/// Failure taxonomy for upstream fetches and cache reads
///
/// Fetch functions never throw: they hand back a `FetchError` that already
/// carries its retry classification. The retry executor acts on that tag and
/// the read-through cache turns terminal failures into `CacheError`.
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// FAILURE CLASSIFICATION
// =============================================================================

/// Retry classification of a failed upstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Upstream signalled quota exhaustion (HTTP 429 and friends)
    RateLimited,
    /// Timeouts, connection resets, 5xx responses
    Transient,
    /// Malformed request, not found, undecodable payload
    Fatal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Transient => "transient",
            FailureKind::Fatal => "fatal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// FETCH ERRORS - produced by fetch functions
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Rate limited by {provider}")]
    RateLimited {
        provider: String,
        /// Server supplied `Retry-After` hint, if any
        retry_after: Option<Duration>,
    },

    #[error("Transient upstream failure: {0}")]
    Transient(String),

    #[error("Fatal upstream failure: {0}")]
    Fatal(String),
}

impl FetchError {
    pub fn rate_limited(provider: &str) -> Self {
        FetchError::RateLimited {
            provider: provider.to_string(),
            retry_after: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        FetchError::Transient(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        FetchError::Fatal(message.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::RateLimited { .. } => FailureKind::RateLimited,
            FetchError::Transient(_) => FailureKind::Transient,
            FetchError::Fatal(_) => FailureKind::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Fatal(_))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

// =============================================================================
// CACHE ERRORS - returned by the read-through cache
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Neither a fresh nor a stale entry exists and the upstream failed
    #[error("No data available for '{key}': {cause}")]
    Unavailable { key: String, cause: FetchError },

    /// Fatal upstream failure while stale fallback on fatal errors is disabled
    #[error("Request for '{key}' rejected upstream: {cause}")]
    Rejected { key: String, cause: FetchError },
}

impl CacheError {
    pub fn key(&self) -> &str {
        match self {
            CacheError::Unavailable { key, .. } | CacheError::Rejected { key, .. } => key,
        }
    }

    pub fn cause(&self) -> &FetchError {
        match self {
            CacheError::Unavailable { cause, .. } | CacheError::Rejected { cause, .. } => cause,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, CacheError::Unavailable { .. })
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// CONFIGURATION ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config field '{field}': {reason}")]
    Invalid { field: String, reason: String },

    #[error("Config already initialized")]
    AlreadyInitialized,

    #[error("Config not initialized. Call load_config() first.")]
    NotInitialized,
}
