/// Log tags identify the subsystem a message comes from
///
/// Each tag maps to a `--debug-<key>` command-line flag.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Cache,
    Gate,
    Retry,
    Throttle,
    Api,
    CoinGecko,
    CryptoCompare,
    Market,
    News,
    Charts,
}

impl LogTag {
    pub fn all() -> &'static [LogTag] {
        &[
            LogTag::System,
            LogTag::Config,
            LogTag::Cache,
            LogTag::Gate,
            LogTag::Retry,
            LogTag::Throttle,
            LogTag::Api,
            LogTag::CoinGecko,
            LogTag::CryptoCompare,
            LogTag::Market,
            LogTag::News,
            LogTag::Charts,
        ]
    }

    /// Key used in `--debug-<key>` flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Cache => "cache",
            LogTag::Gate => "gate",
            LogTag::Retry => "retry",
            LogTag::Throttle => "throttle",
            LogTag::Api => "api",
            LogTag::CoinGecko => "coingecko",
            LogTag::CryptoCompare => "cryptocompare",
            LogTag::Market => "market",
            LogTag::News => "news",
            LogTag::Charts => "charts",
        }
        .to_string()
    }

    pub fn from_debug_key(key: &str) -> Option<LogTag> {
        LogTag::all()
            .iter()
            .copied()
            .find(|tag| tag.to_debug_key() == key.to_lowercase())
    }

    pub fn to_plain_string(&self) -> String {
        self.to_debug_key().to_uppercase()
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
