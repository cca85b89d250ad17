//! SQL generation for the scope, filter, and text stages of a search plan.
//!
//! The builder turns an [`AccessScope`], [`SearchFilters`], and an optional
//! [`TextQuery`] into a parameterized WHERE clause fragment plus the ranking
//! expression used when a text constraint is present. All values are bound as
//! parameters; nothing from the request is interpolated into SQL.

use chrono::{DateTime, Utc};

use coachnote_core::{AccessScope, ResolvedSort, SearchFilters, SortKey, SortOrder, TextQuery};

/// Text search configuration created by the schema migration
/// (english stemming + unaccent).
pub const TEXT_SEARCH_CONFIG: &str = "public.coachnote_search";

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// String parameter.
    String(String),
    /// Array of strings (for ANY / overlap operations).
    StringArray(Vec<String>),
    /// Timestamp parameter.
    Timestamp(DateTime<Utc>),
}

/// Output of [`SearchFilterQueryBuilder::build`].
#[derive(Debug, Clone)]
pub struct SearchFilterClause {
    /// WHERE clause fragment (without the keyword). `TRUE` when empty.
    pub where_clause: String,
    /// Relevance expression, present only when a text constraint applies.
    pub rank_expression: Option<String>,
    /// Parameters in the order they are numbered in the SQL.
    pub params: Vec<QueryParam>,
}

/// Generates SQL WHERE clauses for a search plan's filtering stages.
///
/// # Example
///
/// ```rust,ignore
/// use coachnote_db::search_filter::SearchFilterQueryBuilder;
///
/// let clause = SearchFilterQueryBuilder::new(&plan.scope, &plan.filters, plan.text.as_ref(), 0)
///     .build();
/// // clause.where_clause: "(n.coach_id = $1 OR ...) AND n.tags && $3::text[]"
/// ```
pub struct SearchFilterQueryBuilder<'a> {
    scope: &'a AccessScope,
    filters: &'a SearchFilters,
    text: Option<&'a TextQuery>,
    param_offset: usize,
}

impl<'a> SearchFilterQueryBuilder<'a> {
    /// Create a new builder.
    ///
    /// * `param_offset` - number of parameters already in the query
    pub fn new(
        scope: &'a AccessScope,
        filters: &'a SearchFilters,
        text: Option<&'a TextQuery>,
        param_offset: usize,
    ) -> Self {
        Self {
            scope,
            filters,
            text,
            param_offset,
        }
    }

    pub fn build(&self) -> SearchFilterClause {
        let mut clauses = Vec::new();
        let mut params = Vec::new();
        let mut param_idx = self.param_offset;

        // Scope: owner OR shared-with OR allowed level
        if let AccessScope::Restricted { user_id, levels } = self.scope {
            param_idx += 1;
            let user_param = param_idx;
            params.push(QueryParam::String(user_id.clone()));

            if levels.is_empty() {
                clauses.push(format!(
                    "(n.coach_id = ${0} OR ${0} = ANY(n.shared_with))",
                    user_param
                ));
            } else {
                param_idx += 1;
                clauses.push(format!(
                    "(n.coach_id = ${0} OR ${0} = ANY(n.shared_with) OR n.access_level = ANY(${1}::text[]))",
                    user_param, param_idx
                ));
                params.push(QueryParam::StringArray(
                    levels.iter().map(|l| l.as_str().to_string()).collect(),
                ));
            }
        }

        if let Some(coach_id) = &self.filters.coach_id {
            param_idx += 1;
            clauses.push(format!("n.coach_id = ${}", param_idx));
            params.push(QueryParam::String(coach_id.clone()));
        }

        if let Some(client_id) = &self.filters.client_id {
            param_idx += 1;
            clauses.push(format!("n.client_id = ${}", param_idx));
            params.push(QueryParam::String(client_id.clone()));
        }

        if let Some(session_id) = &self.filters.session_id {
            param_idx += 1;
            clauses.push(format!("n.session_id = ${}", param_idx));
            params.push(QueryParam::String(session_id.clone()));
        }

        // ANY of the tags: array overlap
        if !self.filters.tags.is_empty() {
            param_idx += 1;
            clauses.push(format!("n.tags && ${}::text[]", param_idx));
            params.push(QueryParam::StringArray(self.filters.tags.clone()));
        }

        if !self.filters.access_levels.is_empty() {
            param_idx += 1;
            clauses.push(format!("n.access_level = ANY(${}::text[])", param_idx));
            params.push(QueryParam::StringArray(
                self.filters
                    .access_levels
                    .iter()
                    .map(|l| l.as_str().to_string())
                    .collect(),
            ));
        }

        if let Some(range) = &self.filters.date_range {
            if let Some(start) = range.start {
                param_idx += 1;
                clauses.push(format!("n.created_at >= ${}", param_idx));
                params.push(QueryParam::Timestamp(start));
            }
            if let Some(end) = range.end {
                param_idx += 1;
                clauses.push(format!("n.created_at <= ${}", param_idx));
                params.push(QueryParam::Timestamp(end));
            }
        }

        let mut rank_expression = None;
        if let Some(text) = self.text {
            let mut parts = Vec::new();
            if let Some(positive) = text.positive_expression() {
                param_idx += 1;
                parts.push(format!(
                    "websearch_to_tsquery('{}', ${})",
                    TEXT_SEARCH_CONFIG, param_idx
                ));
                params.push(QueryParam::String(positive));
            }
            if let Some(excluded) = text.excluded_expression() {
                param_idx += 1;
                parts.push(format!(
                    "!! websearch_to_tsquery('{}', ${})",
                    TEXT_SEARCH_CONFIG, param_idx
                ));
                params.push(QueryParam::String(excluded));
            }
            if !parts.is_empty() {
                clauses.push(format!("n.tsv @@ ({})", parts.join(" && ")));
            }

            rank_expression = Some(match text.rank_expression() {
                Some(rank) => {
                    param_idx += 1;
                    params.push(QueryParam::String(rank));
                    // Normalization 32: rank / (rank + 1)
                    format!(
                        "ts_rank(n.tsv, websearch_to_tsquery('{}', ${}), 32)",
                        TEXT_SEARCH_CONFIG, param_idx
                    )
                }
                None => "0::real".to_string(),
            });
        }

        let where_clause = if clauses.is_empty() {
            "TRUE".to_string()
        } else {
            clauses.join(" AND ")
        };

        SearchFilterClause {
            where_clause,
            rank_expression,
            params,
        }
    }
}

/// ORDER BY clause for a resolved sort. Expects the rank to be selected as
/// `score` when sorting by relevance.
pub fn order_clause(sort: &ResolvedSort) -> String {
    let direction = sort.direction.as_sql();
    // Missing values are the smallest: first ascending, last descending.
    let nulls = match sort.direction {
        SortOrder::Asc => "NULLS FIRST",
        SortOrder::Desc => "NULLS LAST",
    };

    let mut keys = vec![match sort.key {
        SortKey::Relevance => format!("score {}", direction),
        SortKey::CreatedAt => format!("n.created_at {}", direction),
        SortKey::Title => format!("n.title COLLATE \"C\" {} {}", direction, nulls),
        SortKey::LastAccessedAt => format!("n.last_accessed_at {} {}", direction, nulls),
    }];
    if sort.created_tiebreak {
        keys.push("n.created_at DESC".to_string());
    }
    keys.push("n.id ASC".to_string());
    keys.join(", ")
}

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Macro-free parameter binding shared by every query that uses the builder.
pub(crate) fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    params: &'q [QueryParam],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for param in params {
        query = match param {
            QueryParam::String(s) => query.bind(s),
            QueryParam::StringArray(arr) => query.bind(arr),
            QueryParam::Timestamp(ts) => query.bind(ts),
        };
    }
    query
}
