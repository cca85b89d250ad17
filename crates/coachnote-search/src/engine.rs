//! Coach note search engine.
//!
//! Turns a requester and caller options into a [`SearchPlan`], hands it to a
//! [`NoteSearchStore`] under a deadline, and shapes the outcome into a
//! [`SearchResult`]. The engine is stateless apart from its store handle and
//! configuration; it never writes.

use std::collections::HashSet;
use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use coachnote_core::{
    defaults::{PAGE_LIMIT_AUTOCOMPLETE, POPULAR_TAGS_LIMIT, SLOW_QUERY_MS},
    AccessScope, Error, NoteSearchStore, Pagination, Requester, ResolvedSort, Result,
    SearchMetadata, SearchOptions, SearchPlan, SearchResult, SuggestionPlan, TagCount, TextQuery,
};

use crate::config::SearchConfig;

/// Search engine over any [`NoteSearchStore`].
///
/// # Example
///
/// ```rust,ignore
/// use coachnote_search::{NoteSearchEngine, SearchConfig};
/// use coachnote_db::Database;
///
/// let db = Database::connect(&database_url).await?;
/// let engine = NoteSearchEngine::with_config(db.search.clone(), SearchConfig::from_env());
/// let result = engine
///     .search_notes(&Requester::new("coach1", "coach"), &SearchOptions::new().with_query("goals"))
///     .await?;
/// ```
#[derive(Clone)]
pub struct NoteSearchEngine<S> {
    store: S,
    config: SearchConfig,
}

impl<S: NoteSearchStore> NoteSearchEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, SearchConfig::default())
    }

    pub fn with_config(store: S, config: SearchConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Resolve a request into the plan the store executes.
    pub fn plan(&self, requester: &Requester, options: &SearchOptions) -> SearchPlan {
        let text = options.query.as_deref().and_then(TextQuery::parse);
        SearchPlan {
            scope: AccessScope::for_requester(requester),
            filters: options.filters(),
            sort: ResolvedSort::resolve(options.sort_by, options.sort_order, text.is_some()),
            text,
            pagination: Pagination::clamped(options.page, options.limit, self.config.default_limit),
            timeout: self.config.query_timeout,
        }
    }

    /// Search notes visible to `requester`.
    ///
    /// Zero matches is an empty page, not an error. Store failures propagate
    /// unchanged; an expired deadline is [`Error::Timeout`].
    #[instrument(skip(self, requester, options), fields(
        subsystem = "search",
        component = "engine",
        op = "search_notes",
        user_id = %requester.user_id,
        user_role = %requester.role,
    ))]
    pub async fn search_notes(
        &self,
        requester: &Requester,
        options: &SearchOptions,
    ) -> Result<SearchResult> {
        let start = Instant::now();
        let plan = self.plan(requester, options);

        debug!(
            has_text_search = plan.has_text_search(),
            unrestricted = plan.scope.is_unrestricted(),
            active_filters = plan.filters.active_count(),
            sort = %plan.sort.describe(),
            page = plan.pagination.page,
            limit = plan.pagination.limit,
            "Search plan resolved"
        );

        let page = with_deadline(plan.timeout, self.store.search(&plan)).await?;
        let execution_time = start.elapsed().as_millis() as u64;

        if execution_time >= SLOW_QUERY_MS {
            warn!(
                duration_ms = execution_time,
                total_count = page.total_count,
                slow = true,
                "Slow note search"
            );
        } else {
            info!(
                duration_ms = execution_time,
                total_count = page.total_count,
                result_count = page.hits.len(),
                "Note search completed"
            );
        }

        Ok(SearchResult {
            total_pages: plan.pagination.total_pages(page.total_count),
            total_count: page.total_count,
            page: plan.pagination.page,
            notes: page.hits,
            search_metadata: SearchMetadata {
                query: options.query.clone(),
                execution_time,
                filters: plan.filters,
            },
        })
    }

    /// Autocomplete strings for a partial query.
    ///
    /// Prefixes shorter than the configured minimum return nothing without
    /// touching the store. `limit` defaults to 10.
    #[instrument(skip(self, requester, partial_query), fields(
        subsystem = "search",
        component = "engine",
        op = "suggest",
        user_id = %requester.user_id,
        user_role = %requester.role,
    ))]
    pub async fn get_search_suggestions(
        &self,
        requester: &Requester,
        partial_query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        let partial = partial_query.trim();
        let limit = limit.unwrap_or(PAGE_LIMIT_AUTOCOMPLETE);
        if partial.chars().count() < self.config.suggestion_min_chars || limit == 0 {
            debug!("Prefix too short or zero limit, skipping store");
            return Ok(Vec::new());
        }

        let plan = SuggestionPlan {
            scope: AccessScope::for_requester(requester),
            partial: partial.to_string(),
            candidate_limit: limit.saturating_mul(self.config.suggestion_overfetch),
            timeout: self.config.query_timeout,
        };

        let candidates = with_deadline(plan.timeout, self.store.suggest(&plan)).await?;
        let candidate_count = candidates.len();

        let mut seen = HashSet::new();
        let suggestions: Vec<String> = candidates
            .iter()
            .map(|c| c.suggestion_text())
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.clone()))
            .take(limit)
            .collect();

        debug!(
            candidate_count,
            result_count = suggestions.len(),
            "Suggestions built"
        );
        Ok(suggestions)
    }

    /// Tag usage statistics.
    ///
    /// Tag popularity is not implemented: this always returns an empty list
    /// and never queries the store.
    #[instrument(skip(self, requester), fields(
        subsystem = "search",
        component = "engine",
        op = "popular_tags",
        user_id = %requester.user_id,
    ))]
    pub async fn get_popular_tags(
        &self,
        requester: &Requester,
        limit: Option<usize>,
    ) -> Result<Vec<TagCount>> {
        debug!(
            limit = limit.unwrap_or(POPULAR_TAGS_LIMIT),
            "Popular tags not implemented, returning empty list"
        );
        Ok(Vec::new())
    }
}

/// Run a store call under an optional deadline. Dropping the future on
/// expiry cancels the in-flight query.
async fn with_deadline<T, F>(timeout: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                let ms = limit.as_millis() as u64;
                warn!(duration_ms = ms, "Store call exceeded deadline");
                Err(Error::Timeout(ms))
            }
        },
        None => fut.await,
    }
}
