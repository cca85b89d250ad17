//! Full-text coach note search over PostgreSQL.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, instrument, warn};

use coachnote_core::{
    defaults::SLOW_QUERY_MS, Error, NotePage, NoteSearchHit, NoteSearchStore, Result, SearchFilters,
    SearchPlan, SuggestionCandidate, SuggestionPlan,
};

use crate::escape_like;
use crate::notes::{map_row_to_note, NOTE_COLUMNS};
use crate::search_filter::{bind_params, order_clause, QueryParam, SearchFilterQueryBuilder};

/// SQLSTATE raised when `statement_timeout` cancels a query.
const QUERY_CANCELED: &str = "57014";

/// PostgreSQL implementation of [`NoteSearchStore`].
///
/// Each call runs in a read transaction so the count and the page see the
/// same snapshot, and so `statement_timeout` can be scoped with `SET LOCAL`.
#[derive(Clone)]
pub struct PgNoteSearch {
    pool: Pool<Postgres>,
}

impl PgNoteSearch {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn begin(&self, timeout: Option<Duration>) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        if let Some(timeout) = timeout {
            // SET does not accept bind parameters; the value is an integer.
            sqlx::query(&format!(
                "SET LOCAL statement_timeout = {}",
                timeout.as_millis().max(1)
            ))
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(tx)
    }
}

/// Map statement cancellation to [`Error::Timeout`]; pass everything else
/// through as a database error.
fn map_query_error(e: sqlx::Error, timeout: Option<Duration>) -> Error {
    if let (Some(timeout), sqlx::Error::Database(db_err)) = (timeout, &e) {
        if db_err.code().as_deref() == Some(QUERY_CANCELED) {
            return Error::Timeout(timeout.as_millis() as u64);
        }
    }
    Error::Database(e)
}

/// `LIMIT` value for a candidate count; saturates instead of wrapping negative.
fn sql_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl NoteSearchStore for PgNoteSearch {
    #[instrument(
        skip(self, plan),
        fields(subsystem = "database", component = "search", op = "search")
    )]
    async fn search(&self, plan: &SearchPlan) -> Result<NotePage> {
        let start = Instant::now();
        let mut tx = self.begin(plan.timeout).await?;

        let clause =
            SearchFilterQueryBuilder::new(&plan.scope, &plan.filters, plan.text.as_ref(), 0)
                .build();

        let count_sql = format!(
            "SELECT COUNT(*) AS count FROM coach_note n WHERE {}",
            clause.where_clause
        );
        let count_row = bind_params(sqlx::query(&count_sql), &clause.params)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_query_error(e, plan.timeout))?;
        let total_count: i64 = count_row.try_get("count").map_err(Error::Database)?;

        let offset = plan.pagination.offset();
        if total_count == 0 || offset >= total_count {
            tx.commit().await.map_err(Error::Database)?;
            return Ok(NotePage {
                hits: Vec::new(),
                total_count,
            });
        }

        let score_column = clause
            .rank_expression
            .clone()
            .unwrap_or_else(|| "NULL::real".to_string());
        let limit_idx = clause.params.len() + 1;
        let page_sql = format!(
            "SELECT {columns}, {score} AS score,
                    (SELECT COUNT(*) FROM coach_note_audit a WHERE a.note_id = n.id) AS audit_count
             FROM coach_note n
             WHERE {where_clause}
             ORDER BY {order}
             LIMIT ${limit} OFFSET ${offset}",
            columns = NOTE_COLUMNS,
            score = score_column,
            where_clause = clause.where_clause,
            order = order_clause(&plan.sort),
            limit = limit_idx,
            offset = limit_idx + 1,
        );

        let rows = bind_params(sqlx::query(&page_sql), &clause.params)
            .bind(plan.pagination.limit)
            .bind(offset)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_query_error(e, plan.timeout))?;
        tx.commit().await.map_err(Error::Database)?;

        let has_text = plan.has_text_search();
        let hits = rows
            .iter()
            .map(|row| {
                let note = map_row_to_note(row)?;
                let audit_count: i64 = row.try_get("audit_count").map_err(Error::Database)?;
                let score: Option<f32> = if has_text {
                    row.try_get("score").map_err(Error::Database)?
                } else {
                    None
                };
                Ok(NoteSearchHit::new(note, audit_count.max(0) as usize, score))
            })
            .collect::<Result<Vec<_>>>()?;

        let duration_ms = start.elapsed().as_millis() as u64;
        if duration_ms >= SLOW_QUERY_MS {
            warn!(
                duration_ms,
                total_count,
                sort = %plan.sort.describe(),
                slow = true,
                "Slow coach note search"
            );
        } else {
            debug!(
                duration_ms,
                total_count,
                result_count = hits.len(),
                "Coach note search completed"
            );
        }

        Ok(NotePage { hits, total_count })
    }

    #[instrument(
        skip(self, plan),
        fields(subsystem = "database", component = "search", op = "suggest")
    )]
    async fn suggest(&self, plan: &SuggestionPlan) -> Result<Vec<SuggestionCandidate>> {
        if plan.candidate_limit == 0 {
            return Ok(Vec::new());
        }

        let mut tx = self.begin(plan.timeout).await?;
        let no_filters = SearchFilters::default();
        let clause = SearchFilterQueryBuilder::new(&plan.scope, &no_filters, None, 0).build();

        let pattern_idx = clause.params.len() + 1;
        let sql = format!(
            r#"SELECT n.title, n.tags
               FROM coach_note n
               WHERE {where_clause}
                 AND (n.title ILIKE ${p} ESCAPE '\'
                      OR n.searchable_content ILIKE ${p} ESCAPE '\'
                      OR EXISTS (SELECT 1 FROM unnest(n.tags) AS t(tag) WHERE t.tag ILIKE ${p} ESCAPE '\'))
               ORDER BY n.created_at DESC, n.id ASC
               LIMIT ${limit}"#,
            where_clause = clause.where_clause,
            p = pattern_idx,
            limit = pattern_idx + 1,
        );

        let mut params = clause.params;
        params.push(QueryParam::String(format!(
            "%{}%",
            escape_like(&plan.partial)
        )));

        let rows = bind_params(sqlx::query(&sql), &params)
            .bind(sql_limit(plan.candidate_limit))
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_query_error(e, plan.timeout))?;
        tx.commit().await.map_err(Error::Database)?;

        let candidates = rows
            .iter()
            .map(|row| {
                Ok(SuggestionCandidate {
                    title: row.try_get("title").map_err(Error::Database)?,
                    tags: row.try_get("tags").map_err(Error::Database)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            result_count = candidates.len(),
            "Suggestion candidates fetched"
        );
        Ok(candidates)
    }
}
