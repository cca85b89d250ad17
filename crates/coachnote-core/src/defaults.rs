//! Centralized default constants for coachnote.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for note search.
pub const PAGE_LIMIT_SEARCH: i64 = 20;

/// Hard upper bound for a search page; larger requests are clamped.
pub const PAGE_LIMIT_MAX: i64 = 100;

/// Smallest page size a request can be clamped to.
pub const PAGE_LIMIT_MIN: i64 = 1;

/// First page number.
pub const FIRST_PAGE: i64 = 1;

// =============================================================================
// SUGGESTIONS
// =============================================================================

/// Default number of autocomplete suggestions.
pub const PAGE_LIMIT_AUTOCOMPLETE: usize = 10;

/// Minimum trimmed prefix length before the store is queried.
pub const SUGGESTION_MIN_CHARS: usize = 2;

/// Candidate notes fetched per requested suggestion, so duplicates that
/// collapse still leave enough distinct entries.
pub const SUGGESTION_OVERFETCH: usize = 3;

// =============================================================================
// TAGS
// =============================================================================

/// Default number of entries for popular tag statistics.
pub const POPULAR_TAGS_LIMIT: usize = 20;

// =============================================================================
// TIMEOUTS
// =============================================================================

/// Default deadline for a single store query in milliseconds.
pub const QUERY_TIMEOUT_MS: u64 = 5_000;

/// Searches slower than this are logged with `slow = true`.
pub const SLOW_QUERY_MS: u64 = 1_000;

// =============================================================================
// SNIPPET
// =============================================================================

/// Snippet length in characters for CLI previews.
pub const SNIPPET_LENGTH: usize = 200;
