//! Core traits for coachnote abstractions.
//!
//! These traits define the interfaces that concrete stores must satisfy,
//! enabling pluggable backends and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AuditAction, CoachNote, CreateCoachNoteRequest};
use crate::search::{NotePage, SearchPlan, SuggestionCandidate, SuggestionPlan};

// =============================================================================
// SEARCH STORE
// =============================================================================

/// A store able to execute search plans.
///
/// Implementations own text matching and relevance scoring; the score they
/// attach to each hit is treated as an opaque comparable.
#[async_trait]
pub trait NoteSearchStore: Send + Sync {
    /// Execute a plan: scope, filter, text-match, sort, and slice one page.
    ///
    /// `NotePage::total_count` must count the full filtered set.
    async fn search(&self, plan: &SearchPlan) -> Result<NotePage>;

    /// Fetch suggestion candidates visible under the plan's scope whose
    /// title, tags, or body contain the prefix, newest first.
    async fn suggest(&self, plan: &SuggestionPlan) -> Result<Vec<SuggestionCandidate>>;
}

// =============================================================================
// NOTE REPOSITORY
// =============================================================================

/// Minimal write-side operations on coach notes.
#[async_trait]
pub trait CoachNoteRepository: Send + Sync {
    /// Insert a new note and record a `created` audit entry.
    async fn insert(&self, req: CreateCoachNoteRequest) -> Result<Uuid>;

    /// Fetch a note by id.
    async fn fetch(&self, id: Uuid) -> Result<CoachNote>;

    /// Grant a user explicit access to a note. Idempotent.
    async fn share_with(&self, id: Uuid, actor_id: &str, user_id: &str) -> Result<()>;

    /// Append an audit entry; `viewed` also bumps `last_accessed_at`.
    async fn record_access(&self, id: Uuid, actor_id: &str, action: AuditAction) -> Result<()>;

    /// Permanently delete a note and its audit trail.
    async fn hard_delete(&self, id: Uuid) -> Result<()>;
}
