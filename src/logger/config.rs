/// Logger configuration and command-line flag parsing
///
/// Recognized flags:
/// - `--debug-<tag>` enables debug output for one tag (`--debug-all` for every tag)
/// - `--verbose` enables verbose output everywhere, `--verbose-<tag>` for one tag
/// - `--quiet` only shows warnings and errors
/// - `--log-level=<level>` sets the threshold directly
use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub debug_tags: HashSet<String>,
    pub verbose_tags: HashSet<String>,
    /// Empty set = all tags enabled
    pub enabled_tags: HashSet<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            verbose_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

/// True for arguments consumed by the logger rather than the CLI parser
pub fn is_logger_flag(arg: &str) -> bool {
    arg == "--verbose"
        || arg == "--quiet"
        || arg.starts_with("--log-level=")
        || arg.starts_with("--debug-")
        || arg.starts_with("--verbose-")
}

/// Build a logger configuration from an argument list
pub fn config_from_args(args: &[String]) -> LoggerConfig {
    let mut config = LoggerConfig::default();

    for arg in args {
        if arg == "--verbose" {
            config.min_level = LogLevel::Verbose;
        } else if arg == "--quiet" {
            config.min_level = LogLevel::Warning;
        } else if let Some(level) = arg.strip_prefix("--log-level=") {
            if let Ok(level) = level.parse::<LogLevel>() {
                config.min_level = level;
            }
        } else if arg == "--debug-all" {
            for tag in LogTag::all() {
                config.debug_tags.insert(tag.to_debug_key());
            }
        } else if let Some(key) = arg.strip_prefix("--debug-") {
            if let Some(tag) = LogTag::from_debug_key(key) {
                config.debug_tags.insert(tag.to_debug_key());
            }
        } else if let Some(key) = arg.strip_prefix("--verbose-") {
            if let Some(tag) = LogTag::from_debug_key(key) {
                config.verbose_tags.insert(tag.to_debug_key());
            }
        }
    }

    // Debug/verbose tags need the threshold lowered to pass the level check
    if config.min_level == LogLevel::Info && !config.verbose_tags.is_empty() {
        config.min_level = LogLevel::Verbose;
    } else if config.min_level == LogLevel::Info && !config.debug_tags.is_empty() {
        config.min_level = LogLevel::Debug;
    }

    config
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = LOGGER_CONFIG.read();
    let key = tag.to_debug_key();
    (config.min_level == LogLevel::Verbose && config.verbose_tags.is_empty())
        || config.debug_tags.contains(&key)
        || config.verbose_tags.contains(&key)
}

pub fn is_verbose_enabled_for_tag(tag: &LogTag) -> bool {
    LOGGER_CONFIG.read().verbose_tags.contains(&tag.to_debug_key())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_debug_flags_select_tags() {
        let config = config_from_args(&args(&["marketfeed", "--debug-cache", "--debug-retry"]));
        assert!(config.debug_tags.contains("cache"));
        assert!(config.debug_tags.contains("retry"));
        assert!(!config.debug_tags.contains("gate"));
        assert_eq!(config.min_level, LogLevel::Debug);
    }

    #[test]
    fn test_unknown_debug_flag_ignored() {
        let config = config_from_args(&args(&["--debug-wallet"]));
        assert!(config.debug_tags.is_empty());
        assert_eq!(config.min_level, LogLevel::Info);
    }

    #[test]
    fn test_quiet_and_verbose() {
        assert_eq!(config_from_args(&args(&["--quiet"])).min_level, LogLevel::Warning);
        assert_eq!(config_from_args(&args(&["--verbose"])).min_level, LogLevel::Verbose);
    }

    #[test]
    fn test_explicit_log_level() {
        let config = config_from_args(&args(&["--log-level=warn"]));
        assert_eq!(config.min_level, LogLevel::Warning);
        assert!(is_logger_flag("--log-level=debug"));
    }

    #[test]
    fn test_debug_all() {
        let config = config_from_args(&args(&["--debug-all"]));
        assert_eq!(config.debug_tags.len(), LogTag::all().len());
    }

    #[test]
    fn test_logger_flags_recognized() {
        assert!(is_logger_flag("--debug-cache"));
        assert!(is_logger_flag("--verbose"));
        assert!(is_logger_flag("--verbose-retry"));
        assert!(!is_logger_flag("--config"));
        assert!(!is_logger_flag("coins"));
    }
}
