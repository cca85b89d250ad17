//! Runtime configuration for the search engine.
//!
//! All settings have compiled-in defaults from [`coachnote_core::defaults`]
//! and can be overridden through environment variables:
//!
//! - `SEARCH_QUERY_TIMEOUT_MS` (default: 5000, `0` disables the deadline)
//! - `SEARCH_DEFAULT_LIMIT` (default: 20, clamped to 1..=100)
//! - `SEARCH_SUGGESTION_MIN_CHARS` (default: 2, never below 2)
//!
//! Unparseable values are ignored with a warning.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use coachnote_core::defaults::{
    PAGE_LIMIT_MAX, PAGE_LIMIT_MIN, PAGE_LIMIT_SEARCH, QUERY_TIMEOUT_MS, SUGGESTION_MIN_CHARS,
    SUGGESTION_OVERFETCH,
};

/// Search engine settings.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use coachnote_search::SearchConfig;
///
/// let config = SearchConfig::default().with_query_timeout(Some(Duration::from_millis(250)));
/// assert_eq!(config.default_limit, 20);
/// assert_eq!(config.query_timeout, Some(Duration::from_millis(250)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Deadline for each store round-trip. `None` waits indefinitely.
    pub query_timeout: Option<Duration>,
    /// Page size when the caller gives none.
    pub default_limit: i64,
    /// Shortest trimmed prefix that reaches the store for suggestions.
    pub suggestion_min_chars: usize,
    /// Candidate notes fetched per requested suggestion, to survive
    /// de-duplication.
    pub suggestion_overfetch: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            query_timeout: Some(Duration::from_millis(QUERY_TIMEOUT_MS)),
            default_limit: PAGE_LIMIT_SEARCH,
            suggestion_min_chars: SUGGESTION_MIN_CHARS,
            suggestion_overfetch: SUGGESTION_OVERFETCH,
        }
    }
}

impl SearchConfig {
    /// Build configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let timeout_ms = parse_env("SEARCH_QUERY_TIMEOUT_MS", QUERY_TIMEOUT_MS);
        let default_limit = parse_env("SEARCH_DEFAULT_LIMIT", defaults.default_limit);
        let suggestion_min_chars =
            parse_env("SEARCH_SUGGESTION_MIN_CHARS", defaults.suggestion_min_chars);

        Self {
            query_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            default_limit: default_limit.clamp(PAGE_LIMIT_MIN, PAGE_LIMIT_MAX),
            suggestion_min_chars: suggestion_min_chars.max(SUGGESTION_MIN_CHARS),
            ..defaults
        }
    }

    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_default_limit(mut self, limit: i64) -> Self {
        self.default_limit = limit.clamp(PAGE_LIMIT_MIN, PAGE_LIMIT_MAX);
        self
    }

    pub fn with_suggestion_min_chars(mut self, chars: usize) -> Self {
        self.suggestion_min_chars = chars.max(SUGGESTION_MIN_CHARS);
        self
    }

    /// Timeout in milliseconds for logs and errors; 0 when disabled.
    pub fn query_timeout_ms(&self) -> u64 {
        self.query_timeout
            .map(|t| t.as_millis() as u64)
            .unwrap_or(0)
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    subsystem = "search",
                    component = "config",
                    key,
                    value = %raw,
                    "Invalid value, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}
