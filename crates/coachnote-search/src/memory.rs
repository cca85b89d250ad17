//! In-process note store.
//!
//! Implements both [`NoteSearchStore`] and [`CoachNoteRepository`] over a
//! shared map, for tests and local tooling. Text matching folds case and
//! diacritics and compares whole tokens; there is no stemming. Relevance is
//! the sum, over matched positive items, of the weight of the best field the
//! item appears in (title > tags > body).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, trace};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};
use uuid::Uuid;

use coachnote_core::{
    AuditAction, CoachNote, CoachNoteRepository, CreateCoachNoteRequest, Error, NoteAuditEntry,
    NotePage, NoteSearchHit, NoteSearchStore, Result, SearchFilters, SearchPlan,
    SuggestionCandidate, SuggestionPlan, TextQuery,
};

const TITLE_WEIGHT: f32 = 1.0;
const TAG_WEIGHT: f32 = 0.4;
const BODY_WEIGHT: f32 = 0.2;

#[derive(Default)]
struct State {
    notes: HashMap<Uuid, CoachNote>,
    audit: Vec<NoteAuditEntry>,
}

impl State {
    fn audit_count(&self, id: Uuid) -> usize {
        self.audit.iter().filter(|e| e.note_id == id).count()
    }

    fn note_mut(&mut self, id: Uuid) -> Result<&mut CoachNote> {
        self.notes.get_mut(&id).ok_or(Error::NoteNotFound(id))
    }
}

/// Cloneable handle to a shared in-memory note set.
#[derive(Clone, Default)]
pub struct InMemoryNoteStore {
    state: Arc<RwLock<State>>,
    latency: Option<Duration>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every search and suggestion call, for exercising deadlines.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.notes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Audit trail of a note, oldest first.
    pub async fn audit_trail(&self, id: Uuid) -> Vec<NoteAuditEntry> {
        let state = self.state.read().await;
        state
            .audit
            .iter()
            .filter(|e| e.note_id == id)
            .cloned()
            .collect()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

// =============================================================================
// MATCHING
// =============================================================================

/// Decompose, drop combining marks, lowercase.
fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

fn tokens(text: &str) -> Vec<String> {
    fold(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Folded token streams of the searchable fields of one note.
struct NoteTokens {
    title: Vec<String>,
    tags: Vec<String>,
    body: Vec<String>,
}

impl NoteTokens {
    fn of(note: &CoachNote) -> Self {
        Self {
            title: note.title.as_deref().map(tokens).unwrap_or_default(),
            tags: tokens(&note.tags.join(" ")),
            body: tokens(&note.searchable_content),
        }
    }

    /// Weight of the best field containing `needle` as a contiguous token
    /// run, or `None`.
    fn weight_of(&self, needle: &[String]) -> Option<f32> {
        if needle.is_empty() {
            return None;
        }
        [
            (&self.title, TITLE_WEIGHT),
            (&self.tags, TAG_WEIGHT),
            (&self.body, BODY_WEIGHT),
        ]
        .into_iter()
        .find(|(field, _)| field.windows(needle.len()).any(|w| w == needle))
        .map(|(_, weight)| weight)
    }

    fn contains(&self, item: &str) -> bool {
        self.weight_of(&tokens(item)).is_some()
    }
}

/// Relevance of a note for a text query, or `None` when it does not match.
fn text_score(note: &CoachNote, query: &TextQuery) -> Option<f32> {
    let doc = NoteTokens::of(note);

    if query.excluded.iter().any(|item| doc.contains(item)) {
        return None;
    }

    let phrase_weights: Vec<Option<f32>> = query
        .phrases
        .iter()
        .map(|p| doc.weight_of(&tokens(p)))
        .collect();
    let term_weights: Vec<Option<f32>> = query
        .terms
        .iter()
        .map(|t| doc.weight_of(&tokens(t)))
        .collect();

    let matched = if !query.phrases.is_empty() {
        phrase_weights.iter().all(Option::is_some)
    } else if !query.terms.is_empty() {
        term_weights.iter().any(Option::is_some)
    } else {
        // Exclusions only
        true
    };
    if !matched {
        return None;
    }

    Some(phrase_weights.iter().chain(term_weights.iter()).flatten().sum())
}

fn matches_filters(note: &CoachNote, filters: &SearchFilters) -> bool {
    if let Some(coach_id) = &filters.coach_id {
        if &note.coach_id != coach_id {
            return false;
        }
    }
    if let Some(client_id) = &filters.client_id {
        if note.client_id.as_ref() != Some(client_id) {
            return false;
        }
    }
    if let Some(session_id) = &filters.session_id {
        if note.session_id.as_ref() != Some(session_id) {
            return false;
        }
    }
    if !filters.tags.is_empty() && !note.tags.iter().any(|t| filters.tags.contains(t)) {
        return false;
    }
    if !filters.access_levels.is_empty() && !filters.access_levels.contains(&note.access_level) {
        return false;
    }
    if let Some(range) = &filters.date_range {
        if !range.contains(&note.created_at) {
            return false;
        }
    }
    true
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

// =============================================================================
// STORE TRAITS
// =============================================================================

#[async_trait]
impl NoteSearchStore for InMemoryNoteStore {
    async fn search(&self, plan: &SearchPlan) -> Result<NotePage> {
        self.simulate_latency().await;
        let state = self.state.read().await;

        let mut hits: Vec<NoteSearchHit> = state
            .notes
            .values()
            .filter(|note| plan.scope.allows(note))
            .filter(|note| matches_filters(note, &plan.filters))
            .filter_map(|note| {
                let score = match &plan.text {
                    Some(query) => Some(text_score(note, query)?),
                    None => None,
                };
                Some(NoteSearchHit::new(
                    note.clone(),
                    state.audit_count(note.id),
                    score,
                ))
            })
            .collect();

        hits.sort_by(|a, b| plan.sort.compare(a, b));
        let total_count = hits.len() as i64;

        let offset = usize::try_from(plan.pagination.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(plan.pagination.limit).unwrap_or(0);
        let hits: Vec<NoteSearchHit> = hits.into_iter().skip(offset).take(limit).collect();

        trace!(
            subsystem = "search",
            component = "memory_store",
            total_count,
            result_count = hits.len(),
            "In-memory search evaluated"
        );
        Ok(NotePage { hits, total_count })
    }

    async fn suggest(&self, plan: &SuggestionPlan) -> Result<Vec<SuggestionCandidate>> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        let needle = plan.partial.to_lowercase();

        let mut notes: Vec<&CoachNote> = state
            .notes
            .values()
            .filter(|note| plan.scope.allows(note))
            .filter(|note| {
                note.title
                    .as_deref()
                    .map(|t| contains_ignore_case(t, &needle))
                    .unwrap_or(false)
                    || note.tags.iter().any(|t| contains_ignore_case(t, &needle))
                    || contains_ignore_case(&note.searchable_content, &needle)
            })
            .collect();

        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        Ok(notes
            .into_iter()
            .take(plan.candidate_limit)
            .map(|note| SuggestionCandidate {
                title: note.title.clone(),
                tags: note.tags.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl CoachNoteRepository for InMemoryNoteStore {
    async fn insert(&self, req: CreateCoachNoteRequest) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let created_at = req.created_at.unwrap_or_else(Utc::now);
        let note = CoachNote {
            id,
            coach_id: req.coach_id,
            session_id: req.session_id,
            client_id: req.client_id,
            title: req.title,
            searchable_content: req.searchable_content,
            tags: req.tags,
            access_level: req.access_level,
            shared_with: req.shared_with,
            audio_url: req.audio_url,
            created_at,
            updated_at: created_at,
            last_accessed_at: None,
        };

        let mut state = self.state.write().await;
        state.audit.push(NoteAuditEntry {
            note_id: id,
            actor_id: note.coach_id.clone(),
            action: AuditAction::Created,
            occurred_at: created_at,
        });
        state.notes.insert(id, note);

        debug!(
            subsystem = "search",
            component = "memory_store",
            op = "insert",
            note_id = %id,
            "Inserted coach note"
        );
        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<CoachNote> {
        let state = self.state.read().await;
        state.notes.get(&id).cloned().ok_or(Error::NoteNotFound(id))
    }

    async fn share_with(&self, id: Uuid, actor_id: &str, user_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let note = state.note_mut(id)?;
        if note.is_shared_with(user_id) {
            return Ok(());
        }
        note.shared_with.push(user_id.to_string());
        note.updated_at = now;
        state.audit.push(NoteAuditEntry {
            note_id: id,
            actor_id: actor_id.to_string(),
            action: AuditAction::Shared,
            occurred_at: now,
        });
        Ok(())
    }

    async fn record_access(&self, id: Uuid, actor_id: &str, action: AuditAction) -> Result<()> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let note = state.note_mut(id)?;
        if action == AuditAction::Viewed {
            note.last_accessed_at = Some(now);
        }
        state.audit.push(NoteAuditEntry {
            note_id: id,
            actor_id: actor_id.to_string(),
            action,
            occurred_at: now,
        });
        Ok(())
    }

    async fn hard_delete(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.notes.remove(&id).ok_or(Error::NoteNotFound(id))?;
        state.audit.retain(|e| e.note_id != id);
        Ok(())
    }
}
