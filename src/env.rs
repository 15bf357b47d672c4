//! Environment variable names used by this crate for configuring the
//! formatter from services without code changes.
//!
//! These are purely helpers; [`FormatterConfig`](crate::config::FormatterConfig)
//! itself stays decoupled from environment access unless
//! `FormatterConfig::from_env` is called.

use crate::error::ConfigError;

/// Maximum `message` length in characters, or `none` for unlimited.
pub const LOG_FORMAT_MESSAGE_SIZE_LIMIT_ENV: &str = "LOG_FORMAT_MESSAGE_SIZE_LIMIT";

/// Maximum length of `error`, `stack_info` and `formatter_errors`, or
/// `none` for unlimited.
pub const LOG_FORMAT_STACK_SIZE_LIMIT_ENV: &str = "LOG_FORMAT_STACK_SIZE_LIMIT";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a size limit: an integer, or `none` / `unlimited` / empty for
/// no limit.
pub fn parse_limit(key: &str, raw: &str) -> Result<Option<usize>, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("none")
        || trimmed.eq_ignore_ascii_case("unlimited")
    {
        return Ok(None);
    }
    trimmed
        .parse::<usize>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidLimit {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integers_and_unlimited() {
        assert_eq!(parse_limit("K", "1024"), Ok(Some(1024)));
        assert_eq!(parse_limit("K", " 10 "), Ok(Some(10)));
        assert_eq!(parse_limit("K", "none"), Ok(None));
        assert_eq!(parse_limit("K", "Unlimited"), Ok(None));
        assert_eq!(parse_limit("K", ""), Ok(None));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            parse_limit("K", "-5"),
            Err(ConfigError::InvalidLimit {
                key: "K".to_string(),
                value: "-5".to_string()
            })
        );
    }
}
