//! # coachnote-search
//!
//! Search over coach notes.
//!
//! This crate provides:
//! - [`NoteSearchEngine`]: access scoping, filtering, full-text matching,
//!   sorting and pagination over any [`NoteSearchStore`]
//! - Autocomplete suggestions from note titles and tags
//! - [`InMemoryNoteStore`], an in-process store for tests and local tooling
//! - [`SearchConfig`], environment-driven engine settings
//!
//! The PostgreSQL store lives in `coachnote-db` as `PgNoteSearch`.

pub mod config;
pub mod engine;
pub mod memory;

pub use config::SearchConfig;
pub use engine::NoteSearchEngine;
pub use memory::InMemoryNoteStore;

// Re-export core types for convenience
pub use coachnote_core::{
    AccessLevel, AuditAction, CoachNote, CoachNoteRepository, CreateCoachNoteRequest, Error,
    NoteSearchHit, NoteSearchStore, Requester, Result, SearchOptions, SearchResult, SortBy,
    SortOrder, TagCount, UserRole,
};
