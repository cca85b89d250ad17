//! Search request, plan, and result types.
//!
//! A search runs as a fixed sequence of logical stages:
//! scope → structured filters → text match → sort → paginate.
//! [`SearchPlan`] carries the outcome of every stage in backend-neutral form;
//! each store translates it into its own query language at the boundary.

use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::AccessScope;
use crate::defaults::{FIRST_PAGE, PAGE_LIMIT_MAX, PAGE_LIMIT_MIN, PAGE_LIMIT_SEARCH};
use crate::models::{AccessLevel, NoteSearchHit};
use crate::text_query::TextQuery;

// =============================================================================
// REQUEST
// =============================================================================

/// Field a search is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    #[serde(rename = "relevance")]
    Relevance,
    #[default]
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "lastAccess")]
    LastAccess,
}

impl std::str::FromStr for SortBy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(Self::Relevance),
            "date" => Ok(Self::Date),
            "title" => Ok(Self::Title),
            "lastAccess" | "last_access" => Ok(Self::LastAccess),
            _ => Err(format!("Invalid sort field: {}", s)),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Apply this direction to an ascending comparison.
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("Invalid sort order: {}", s)),
        }
    }
}

/// Inclusive creation-time range; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.start.map(|s| *at >= s).unwrap_or(true) && self.end.map(|e| *at <= e).unwrap_or(true)
    }
}

/// Caller-supplied search options, in the wire shape used by the HTTP layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_level: Vec<AccessLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_access_levels(mut self, levels: impl IntoIterator<Item = AccessLevel>) -> Self {
        self.access_level = levels.into_iter().collect();
        self
    }

    pub fn with_date_range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.date_range = Some(DateRange { start, end });
        self
    }

    pub fn with_coach(mut self, coach_id: impl Into<String>) -> Self {
        self.coach_id = Some(coach_id.into());
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sorted_by(mut self, sort_by: SortBy, sort_order: SortOrder) -> Self {
        self.sort_by = Some(sort_by);
        self.sort_order = Some(sort_order);
        self
    }

    /// The structured (non-text) filters of this request.
    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            tags: self.tags.clone(),
            access_levels: self.access_level.clone(),
            date_range: self.date_range.filter(|r| !r.is_empty()),
            coach_id: self.coach_id.clone(),
            client_id: self.client_id.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

// =============================================================================
// PLAN
// =============================================================================

/// Structured filters, AND-combined. Empty fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Note matches if it carries ANY of these tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "accessLevel")]
    pub access_levels: Vec<AccessLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
            && self.access_levels.is_empty()
            && self.date_range.is_none()
            && self.coach_id.is_none()
            && self.client_id.is_none()
            && self.session_id.is_none()
    }

    /// Number of active filter dimensions.
    pub fn active_count(&self) -> usize {
        [
            !self.tags.is_empty(),
            !self.access_levels.is_empty(),
            self.date_range.is_some(),
            self.coach_id.is_some(),
            self.client_id.is_some(),
            self.session_id.is_some(),
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }
}

/// Page window after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number, always >= 1.
    pub page: i64,
    /// Page size, always within [1, 100].
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: FIRST_PAGE,
            limit: PAGE_LIMIT_SEARCH,
        }
    }
}

impl Pagination {
    /// Clamp raw page/limit values. Out-of-range input is corrected, never
    /// rejected.
    pub fn clamped(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        let default_limit = default_limit.clamp(PAGE_LIMIT_MIN, PAGE_LIMIT_MAX);
        Self {
            page: page.unwrap_or(FIRST_PAGE).max(FIRST_PAGE),
            limit: limit
                .unwrap_or(default_limit)
                .clamp(PAGE_LIMIT_MIN, PAGE_LIMIT_MAX),
        }
    }

    /// Number of rows skipped before this page.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// `ceil(total / limit)`.
    pub fn total_pages(&self, total_count: i64) -> i64 {
        if total_count <= 0 {
            return 0;
        }
        (total_count + self.limit - 1) / self.limit
    }
}

/// Primary sort key after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Relevance,
    CreatedAt,
    Title,
    LastAccessedAt,
}

/// Effective total order of a search.
///
/// | sort_by | text search | order |
/// |---|---|---|
/// | relevance | yes | score desc, created desc |
/// | relevance | no | created desc |
/// | title | any | title (dir), created desc |
/// | lastAccess | any | last access (dir), created desc |
/// | date | any | created (dir) |
///
/// Missing titles and access times compare as the smallest value. Every order
/// ends with note id ascending so pages partition the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSort {
    pub key: SortKey,
    pub direction: SortOrder,
    /// Whether `created_at desc` breaks ties on the primary key.
    pub created_tiebreak: bool,
}

impl ResolvedSort {
    pub fn resolve(sort_by: Option<SortBy>, sort_order: Option<SortOrder>, has_text_search: bool) -> Self {
        let direction = sort_order.unwrap_or_default();
        match sort_by.unwrap_or_default() {
            SortBy::Relevance if has_text_search => Self {
                key: SortKey::Relevance,
                direction: SortOrder::Desc,
                created_tiebreak: true,
            },
            SortBy::Relevance => Self {
                key: SortKey::CreatedAt,
                direction: SortOrder::Desc,
                created_tiebreak: false,
            },
            SortBy::Title => Self {
                key: SortKey::Title,
                direction,
                created_tiebreak: true,
            },
            SortBy::LastAccess => Self {
                key: SortKey::LastAccessedAt,
                direction,
                created_tiebreak: true,
            },
            SortBy::Date => Self {
                key: SortKey::CreatedAt,
                direction,
                created_tiebreak: false,
            },
        }
    }

    /// Compare two hits under this order.
    pub fn compare(&self, a: &NoteSearchHit, b: &NoteSearchHit) -> Ordering {
        let primary = match self.key {
            SortKey::Relevance => {
                let sa = a.score.unwrap_or(0.0);
                let sb = b.score.unwrap_or(0.0);
                self.direction
                    .apply(sa.partial_cmp(&sb).unwrap_or(Ordering::Equal))
            }
            SortKey::CreatedAt => self
                .direction
                .apply(a.note.created_at.cmp(&b.note.created_at)),
            SortKey::Title => self.direction.apply(a.note.title.cmp(&b.note.title)),
            SortKey::LastAccessedAt => self
                .direction
                .apply(a.note.last_accessed_at.cmp(&b.note.last_accessed_at)),
        };

        primary
            .then_with(|| {
                if self.created_tiebreak {
                    b.note.created_at.cmp(&a.note.created_at)
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| a.note.id.cmp(&b.note.id))
    }

    /// Short human-readable form for logs.
    pub fn describe(&self) -> String {
        let key = match self.key {
            SortKey::Relevance => "relevance",
            SortKey::CreatedAt => "created_at",
            SortKey::Title => "title",
            SortKey::LastAccessedAt => "last_accessed_at",
        };
        format!("{} {}", key, self.direction.as_sql().to_lowercase())
    }
}

/// Backend-neutral description of one search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPlan {
    pub scope: AccessScope,
    pub filters: SearchFilters,
    /// `None` means no text constraint.
    pub text: Option<TextQuery>,
    pub sort: ResolvedSort,
    pub pagination: Pagination,
    /// Deadline for the store round-trip.
    pub timeout: Option<Duration>,
}

impl SearchPlan {
    pub fn has_text_search(&self) -> bool {
        self.text.is_some()
    }
}

/// One page of hits plus the size of the full filtered set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotePage {
    pub hits: Vec<NoteSearchHit>,
    /// Count over every match, independent of the page window.
    pub total_count: i64,
}

/// Backend-neutral description of an autocomplete lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionPlan {
    pub scope: AccessScope,
    /// Trimmed prefix, matched case-insensitively as a substring.
    pub partial: String,
    /// Maximum candidate notes to retrieve, newest first.
    pub candidate_limit: usize,
    pub timeout: Option<Duration>,
}

/// Fields of a note a suggestion is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionCandidate {
    pub title: Option<String>,
    pub tags: Vec<String>,
}

impl SuggestionCandidate {
    /// `"{title} {tags joined by space}"`, trimmed.
    pub fn suggestion_text(&self) -> String {
        let title = self.title.as_deref().unwrap_or("");
        format!("{} {}", title, self.tags.join(" ")).trim().to_string()
    }
}

// =============================================================================
// RESULT
// =============================================================================

/// Metadata echoed with every search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Wall-clock time in milliseconds.
    pub execution_time: u64,
    pub filters: SearchFilters,
}

/// Result of a note search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub notes: Vec<NoteSearchHit>,
    pub total_count: i64,
    pub page: i64,
    pub total_pages: i64,
    pub search_metadata: SearchMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CoachNote;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use uuid::Uuid;

    fn hit(title: Option<&str>, day: u32, score: Option<f32>) -> NoteSearchHit {
        let created = Utc.with_ymd_and_hms(2026, 1, day, 9, 0, 0).unwrap();
        NoteSearchHit::new(
            CoachNote {
                id: Uuid::new_v4(),
                coach_id: "c1".to_string(),
                session_id: None,
                client_id: None,
                title: title.map(String::from),
                searchable_content: String::new(),
                tags: Vec::new(),
                access_level: AccessLevel::Private,
                shared_with: Vec::new(),
                audio_url: None,
                created_at: created,
                updated_at: created,
                last_accessed_at: None,
            },
            0,
            score,
        )
    }

    #[test]
    fn test_pagination_defaults() {
        let p = Pagination::clamped(None, None, PAGE_LIMIT_SEARCH);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 20);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_clamps_out_of_range() {
        assert_eq!(Pagination::clamped(Some(0), Some(0), 20), Pagination { page: 1, limit: 1 });
        assert_eq!(Pagination::clamped(Some(-4), Some(-10), 20), Pagination { page: 1, limit: 1 });
        assert_eq!(Pagination::clamped(Some(3), Some(500), 20), Pagination { page: 3, limit: 100 });
    }

    #[test]
    fn test_pagination_clamps_default_limit() {
        assert_eq!(Pagination::clamped(None, None, 1000).limit, 100);
    }

    #[test]
    fn test_offset_and_total_pages() {
        let p = Pagination { page: 3, limit: 20 };
        assert_eq!(p.offset(), 40);
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(1), 1);
        assert_eq!(p.total_pages(20), 1);
        assert_eq!(p.total_pages(21), 2);
        assert_eq!(p.total_pages(100), 5);
    }

    #[test]
    fn test_resolve_relevance_with_text() {
        let s = ResolvedSort::resolve(Some(SortBy::Relevance), Some(SortOrder::Asc), true);
        assert_eq!(s.key, SortKey::Relevance);
        assert_eq!(s.direction, SortOrder::Desc);
        assert!(s.created_tiebreak);
    }

    #[test]
    fn test_resolve_relevance_without_text_falls_back_to_date() {
        let s = ResolvedSort::resolve(Some(SortBy::Relevance), Some(SortOrder::Asc), false);
        assert_eq!(s.key, SortKey::CreatedAt);
        assert_eq!(s.direction, SortOrder::Desc);
    }

    #[test]
    fn test_resolve_default_is_date_desc() {
        let s = ResolvedSort::resolve(None, None, true);
        assert_eq!(s.key, SortKey::CreatedAt);
        assert_eq!(s.direction, SortOrder::Desc);
        assert!(!s.created_tiebreak);
    }

    #[test]
    fn test_resolve_title_and_last_access_keep_direction() {
        let s = ResolvedSort::resolve(Some(SortBy::Title), Some(SortOrder::Asc), false);
        assert_eq!((s.key, s.direction), (SortKey::Title, SortOrder::Asc));
        let s = ResolvedSort::resolve(Some(SortBy::LastAccess), None, false);
        assert_eq!((s.key, s.direction), (SortKey::LastAccessedAt, SortOrder::Desc));
    }

    #[test]
    fn test_relevance_ties_break_on_newest() {
        let sort = ResolvedSort::resolve(Some(SortBy::Relevance), None, true);
        let older = hit(None, 1, Some(0.5));
        let newer = hit(None, 2, Some(0.5));
        let best = hit(None, 1, Some(0.9));
        let mut hits = vec![older.clone(), newer.clone(), best.clone()];
        hits.sort_by(|a, b| sort.compare(a, b));
        assert_eq!(hits[0].note.id, best.note.id);
        assert_eq!(hits[1].note.id, newer.note.id);
        assert_eq!(hits[2].note.id, older.note.id);
    }

    #[test]
    fn test_title_sort_missing_title_is_smallest() {
        let asc = ResolvedSort::resolve(Some(SortBy::Title), Some(SortOrder::Asc), false);
        let untitled = hit(None, 1, None);
        let alpha = hit(Some("Alpha"), 1, None);
        assert_eq!(asc.compare(&untitled, &alpha), Ordering::Less);

        let desc = ResolvedSort::resolve(Some(SortBy::Title), Some(SortOrder::Desc), false);
        assert_eq!(desc.compare(&untitled, &alpha), Ordering::Greater);
    }

    #[test]
    fn test_last_access_sort_uses_access_time() {
        let sort = ResolvedSort::resolve(Some(SortBy::LastAccess), Some(SortOrder::Desc), false);
        let mut recent = hit(None, 1, None);
        recent.note.last_accessed_at = Some(recent.note.created_at + ChronoDuration::days(10));
        let stale = hit(None, 5, None);
        assert_eq!(sort.compare(&recent, &stale), Ordering::Less);
    }

    #[test]
    fn test_sort_by_wire_names() {
        assert_eq!(serde_json::to_string(&SortBy::LastAccess).unwrap(), "\"lastAccess\"");
        assert_eq!("lastAccess".parse::<SortBy>().unwrap(), SortBy::LastAccess);
        assert!("newest".parse::<SortBy>().is_err());
    }

    #[test]
    fn test_search_options_from_json() {
        let json = r#"{
            "query": "\"session plan\" -draft",
            "tags": ["a", "b"],
            "accessLevel": ["team"],
            "dateRange": {"start": "2026-01-01T00:00:00Z"},
            "page": 2,
            "limit": 10,
            "sortBy": "title",
            "sortOrder": "asc"
        }"#;
        let opts: SearchOptions = serde_json::from_str(json).unwrap();
        assert_eq!(opts.tags, vec!["a", "b"]);
        assert_eq!(opts.access_level, vec![AccessLevel::Team]);
        assert_eq!(opts.sort_by, Some(SortBy::Title));
        assert_eq!(opts.sort_order, Some(SortOrder::Asc));
        let filters = opts.filters();
        assert_eq!(filters.active_count(), 3);
        assert!(filters.date_range.unwrap().end.is_none());
    }

    #[test]
    fn test_empty_date_range_is_dropped_from_filters() {
        let opts = SearchOptions::new().with_date_range(None, None);
        assert!(opts.filters().is_empty());
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap();
        let range = DateRange {
            start: Some(start),
            end: Some(end),
        };
        assert!(range.contains(&start));
        assert!(range.contains(&end));
        assert!(!range.contains(&(end + ChronoDuration::seconds(1))));
    }

    #[test]
    fn test_suggestion_text() {
        let c = SuggestionCandidate {
            title: Some("Goal review".to_string()),
            tags: vec!["goals".to_string(), "q1".to_string()],
        };
        assert_eq!(c.suggestion_text(), "Goal review goals q1");

        let untitled = SuggestionCandidate {
            title: None,
            tags: vec!["goals".to_string()],
        };
        assert_eq!(untitled.suggestion_text(), "goals");

        let empty = SuggestionCandidate {
            title: None,
            tags: Vec::new(),
        };
        assert_eq!(empty.suggestion_text(), "");
    }
}
