//! Structured logging for marketfeed
//!
//! ## Usage
//!
//! ```rust
//! use marketfeed::logger::{self, LogTag};
//!
//! logger::error(LogTag::Cache, "No data available for coins_list?page=1&per_page=50");
//! logger::warning(LogTag::Retry, "Transient failure, retrying in 500ms");
//! logger::info(LogTag::Cache, "Serving stale entry");
//! logger::debug(LogTag::Gate, "Waiting for slot"); // Only with --debug-gate
//! logger::verbose(LogTag::Cache, "Fresh hit"); // Only with --verbose
//! ```
//!
//! At startup, pass the flags selected by `is_logger_flag` through
//! `config_from_args` and install the result with `set_logger_config`.

mod config;
mod core;
mod format;
mod levels;
mod tags;

pub use config::{
    config_from_args, get_logger_config, is_logger_flag, set_logger_config, LoggerConfig,
};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level, only shown with --debug-<tag>
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level, only shown with --verbose
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}
