//! Coach note repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use coachnote_core::{
    AccessLevel, AuditAction, CoachNote, CoachNoteRepository, CreateCoachNoteRequest, Error,
    NoteAuditEntry, Result,
};

/// Columns of `coach_note` selected for a full [`CoachNote`], aliased `n`.
pub(crate) const NOTE_COLUMNS: &str = "n.id, n.coach_id, n.session_id, n.client_id, n.title, \
     n.searchable_content, n.tags, n.access_level, n.shared_with, n.audio_url, \
     n.created_at, n.updated_at, n.last_accessed_at";

/// PostgreSQL implementation of [`CoachNoteRepository`].
#[derive(Clone)]
pub struct PgCoachNoteRepository {
    pool: Pool<Postgres>,
}

impl PgCoachNoteRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a note within an existing transaction.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        req: CreateCoachNoteRequest,
    ) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let created_at = req.created_at.unwrap_or_else(Utc::now);

        sqlx::query(
            "INSERT INTO coach_note (id, coach_id, session_id, client_id, title, searchable_content,
                                     tags, access_level, shared_with, audio_url, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)",
        )
        .bind(id)
        .bind(&req.coach_id)
        .bind(&req.session_id)
        .bind(&req.client_id)
        .bind(&req.title)
        .bind(&req.searchable_content)
        .bind(&req.tags)
        .bind(req.access_level.as_str())
        .bind(&req.shared_with)
        .bind(&req.audio_url)
        .bind(created_at)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        self.audit_tx(tx, id, &req.coach_id, AuditAction::Created, created_at)
            .await?;

        debug!(
            subsystem = "database",
            component = "notes",
            op = "insert",
            note_id = %id,
            "Inserted coach note"
        );
        Ok(id)
    }

    async fn audit_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        actor_id: &str,
        action: AuditAction,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO coach_note_audit (note_id, actor_id, action, occurred_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(actor_id)
        .bind(action.as_str())
        .bind(at)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn exists_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM coach_note WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut **tx)
                .await
                .map_err(Error::Database)?;
        Ok(exists)
    }

    /// Audit trail of a note, oldest first.
    pub async fn audit_trail(&self, id: Uuid) -> Result<Vec<NoteAuditEntry>> {
        let rows = sqlx::query(
            "SELECT note_id, actor_id, action, occurred_at
             FROM coach_note_audit WHERE note_id = $1 ORDER BY occurred_at, id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                let action: String = row.try_get("action").map_err(Error::Database)?;
                Ok(NoteAuditEntry {
                    note_id: row.try_get("note_id").map_err(Error::Database)?,
                    actor_id: row.try_get("actor_id").map_err(Error::Database)?,
                    action: action.parse().map_err(Error::Internal)?,
                    occurred_at: row.try_get("occurred_at").map_err(Error::Database)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CoachNoteRepository for PgCoachNoteRepository {
    async fn insert(&self, req: CreateCoachNoteRequest) -> Result<Uuid> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let id = self.insert_tx(&mut tx, req).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<CoachNote> {
        let query = format!("SELECT {} FROM coach_note n WHERE n.id = $1", NOTE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::NoteNotFound(id))?;
        map_row_to_note(&row)
    }

    async fn share_with(&self, id: Uuid, actor_id: &str, user_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        if !self.exists_tx(&mut tx, id).await? {
            return Err(Error::NoteNotFound(id));
        }

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE coach_note
             SET shared_with = array_append(shared_with, $2), updated_at = $3
             WHERE id = $1 AND NOT ($2 = ANY(shared_with))",
        )
        .bind(id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // Already shared: nothing to audit.
        if result.rows_affected() > 0 {
            self.audit_tx(&mut tx, id, actor_id, AuditAction::Shared, now)
                .await?;
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn record_access(&self, id: Uuid, actor_id: &str, action: AuditAction) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        if !self.exists_tx(&mut tx, id).await? {
            return Err(Error::NoteNotFound(id));
        }

        let now = Utc::now();
        self.audit_tx(&mut tx, id, actor_id, action, now).await?;
        if action == AuditAction::Viewed {
            sqlx::query("UPDATE coach_note SET last_accessed_at = $2 WHERE id = $1")
                .bind(id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn hard_delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM coach_note WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }
        Ok(())
    }
}

/// Map a row selected with [`NOTE_COLUMNS`] to a [`CoachNote`].
pub(crate) fn map_row_to_note(row: &PgRow) -> Result<CoachNote> {
    let access_level: String = row.try_get("access_level").map_err(Error::Database)?;
    let access_level: AccessLevel = access_level.parse().map_err(Error::Internal)?;

    Ok(CoachNote {
        id: row.try_get("id").map_err(Error::Database)?,
        coach_id: row.try_get("coach_id").map_err(Error::Database)?,
        session_id: row.try_get("session_id").map_err(Error::Database)?,
        client_id: row.try_get("client_id").map_err(Error::Database)?,
        title: row.try_get("title").map_err(Error::Database)?,
        searchable_content: row.try_get("searchable_content").map_err(Error::Database)?,
        tags: row.try_get("tags").map_err(Error::Database)?,
        access_level,
        shared_with: row.try_get("shared_with").map_err(Error::Database)?,
        audio_url: row.try_get("audio_url").map_err(Error::Database)?,
        created_at: row.try_get("created_at").map_err(Error::Database)?,
        updated_at: row.try_get("updated_at").map_err(Error::Database)?,
        last_accessed_at: row.try_get("last_accessed_at").map_err(Error::Database)?,
    })
}
