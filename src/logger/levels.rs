use std::fmt;
use std::str::FromStr;

/// Severity threshold, ordered Error < Warning < Info < Debug < Verbose
///
/// A message passes when its level is at or below the configured minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    /// Default threshold
    Info = 2,
    /// Per-tag, needs `--debug-<tag>`
    Debug = 3,
    Verbose = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Verbose => "VERBOSE",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    /// Case-insensitive; accepts `warn` and `trace` aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ERROR" => Ok(LogLevel::Error),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "INFO" => Ok(LogLevel::Info),
            "DEBUG" => Ok(LogLevel::Debug),
            "VERBOSE" | "TRACE" => Ok(LogLevel::Verbose),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("Trace".parse::<LogLevel>(), Ok(LogLevel::Verbose));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(LogLevel::Error < LogLevel::Warning);
        assert!(LogLevel::Debug < LogLevel::Verbose);
    }
}
