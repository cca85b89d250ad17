//! # coachnote-core
//!
//! Core types, traits, and abstractions for coachnote search.
//!
//! This crate provides the domain model for coach notes, the role-based
//! access policy, search request/plan/result types, the text query parser,
//! and the store traits the other coachnote crates implement.

pub mod access;
pub mod defaults;
pub mod error;
pub mod models;
pub mod search;
pub mod text_query;
pub mod traits;

// Re-export commonly used types at crate root
pub use access::{allowed_levels, AccessScope, ACCESS_POLICY};
pub use error::{Error, Result};
pub use models::*;
pub use search::*;
pub use text_query::TextQuery;
pub use traits::*;
