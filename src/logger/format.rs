//! Log formatting and output with ANSI colors and text wrapping
//!
//! Every log line goes to stderr so command output on stdout stays
//! machine readable.

use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stderr, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 13;
const LEVEL_WIDTH: usize = 7;

/// Maximum line length before wrapping
const MAX_LINE_LENGTH: usize = 145;

pub fn format_and_log(tag: LogTag, level: LogLevel, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();
    let base_line = format!(
        "{} [{}] [{}] ",
        time.dimmed(),
        format_tag(&tag),
        format_level(level)
    );

    let base_length = strip_ansi_codes(&base_line).len();
    let available_space = if MAX_LINE_LENGTH > base_length + 20 {
        MAX_LINE_LENGTH - base_length
    } else {
        50
    };

    let chunks = wrap_text(message, available_space);
    write_safe(&format!("{}{}", base_line, chunks[0]));

    if chunks.len() > 1 {
        let continuation_prefix = " ".repeat(base_length);
        for chunk in &chunks[1..] {
            write_safe(&format!("{}{}", continuation_prefix, chunk));
        }
    }
}

fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.bright_white().bold(),
        LogTag::Cache => label.bright_cyan().bold(),
        LogTag::Gate => label.bright_blue().bold(),
        LogTag::Retry => label.bright_magenta().bold(),
        LogTag::Throttle => label.bright_purple().bold(),
        LogTag::Api => label.bright_green().bold(),
        LogTag::CoinGecko => label.green().bold(),
        LogTag::CryptoCompare => label.blue().bold(),
        LogTag::Market => label.cyan().bold(),
        LogTag::News => label.magenta().bold(),
        LogTag::Charts => label.yellow().bold(),
    }
}

fn format_level(level: LogLevel) -> ColoredString {
    let label = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.bright_yellow().bold(),
        LogLevel::Info => label.white().bold(),
        LogLevel::Debug => label.bright_black(),
        LogLevel::Verbose => label.dimmed(),
    }
}

/// Write a line but ignore broken pipe errors
fn write_safe(message: &str) {
    if let Err(e) = writeln!(stderr(), "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
}

/// Remove ANSI color codes from text
fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::new();
    let mut in_escape = false;

    for ch in text.chars() {
        if ch == '\x1b' {
            in_escape = true;
        } else if in_escape && ch == 'm' {
            in_escape = false;
        } else if !in_escape {
            result.push(ch);
        }
    }
    result
}

/// Wrap text at word boundaries, respecting existing newlines
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for line in text.split('\n') {
        if line.chars().count() <= max_width {
            result.push(line.to_string());
            continue;
        }

        let mut current_line = String::new();
        for word in line.split_whitespace() {
            let word_len = word.chars().count();
            let current_len = current_line.chars().count();

            if word_len > max_width {
                if !current_line.is_empty() {
                    result.push(std::mem::take(&mut current_line));
                }
                let chars: Vec<char> = word.chars().collect();
                for chunk in chars.chunks(max_width) {
                    result.push(chunk.iter().collect());
                }
            } else if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_len + word_len + 1 <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                result.push(std::mem::replace(&mut current_line, word.to_string()));
            }
        }

        if !current_line.is_empty() {
            result.push(current_line);
        }
    }

    if result.is_empty() {
        result.push(String::new());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text_breaks_on_words() {
        let lines = wrap_text("alpha beta gamma delta", 11);
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn test_wrap_text_splits_long_words() {
        let lines = wrap_text("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi_codes("\x1b[1;31mERROR\x1b[0m"), "ERROR");
    }
}
