//! Shared setup for engine integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use coachnote_search::{
    AccessLevel, CoachNoteRepository, CreateCoachNoteRequest, InMemoryNoteStore,
    NoteSearchEngine, Requester,
};

/// Midnight UTC on 2026-01-01 plus `n` days.
pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
}

pub fn coach(id: &str) -> Requester {
    Requester::new(id, "coach")
}

pub fn supervisor(id: &str) -> Requester {
    Requester::new(id, "supervisor")
}

pub fn admin() -> Requester {
    Requester::new("admin1", "admin")
}

/// Store plus engine over it, sharing the same notes.
pub struct Fixture {
    pub store: InMemoryNoteStore,
    pub engine: NoteSearchEngine<InMemoryNoteStore>,
}

impl Fixture {
    pub fn new() -> Self {
        let store = InMemoryNoteStore::new();
        Self {
            engine: NoteSearchEngine::new(store.clone()),
            store,
        }
    }

    pub async fn add(&self, req: CreateCoachNoteRequest) -> Uuid {
        self.store.insert(req).await.expect("insert note")
    }

    /// Note owned by `owner` at `level`, created on `day(n)`.
    pub async fn note(&self, owner: &str, level: AccessLevel, n: i64) -> Uuid {
        self.add(
            CreateCoachNoteRequest::new(owner, format!("note by {} on day {}", owner, n))
                .with_access_level(level)
                .created_at(day(n)),
        )
        .await
    }
}
