//! Domain models for coach notes and the people who search them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ACCESS LEVEL
// =============================================================================

/// Visibility level recorded on every coach note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Only the owning coach (and explicit shares).
    Private,
    /// Visible to the coached client.
    Client,
    /// Visible to the coach's team.
    Team,
    /// Visible to supervisors.
    Supervisor,
    /// Visible to the whole organization.
    Organization,
}

impl AccessLevel {
    /// Every level, in declaration order.
    pub const ALL: [AccessLevel; 5] = [
        AccessLevel::Private,
        AccessLevel::Client,
        AccessLevel::Team,
        AccessLevel::Supervisor,
        AccessLevel::Organization,
    ];

    /// Stable lowercase name used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Client => "client",
            Self::Team => "team",
            Self::Supervisor => "supervisor",
            Self::Organization => "organization",
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessLevel {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "client" => Ok(Self::Client),
            "team" => Ok(Self::Team),
            "supervisor" => Ok(Self::Supervisor),
            "organization" => Ok(Self::Organization),
            _ => Err(format!("Invalid access level: {}", s)),
        }
    }
}

// =============================================================================
// USER ROLE / REQUESTER
// =============================================================================

/// Role of the user issuing a search.
///
/// Roles come from the upstream auth layer as free-form strings. Anything that
/// is not a known role is kept verbatim in `Other` and treated as the most
/// restrictive role by the access policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserRole {
    Admin,
    Supervisor,
    Coach,
    Other(String),
}

impl UserRole {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Supervisor => "supervisor",
            Self::Coach => "coach",
            Self::Other(role) => role.as_str(),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl From<&str> for UserRole {
    fn from(s: &str) -> Self {
        match s {
            "admin" => Self::Admin,
            "supervisor" => Self::Supervisor,
            "coach" => Self::Coach,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for UserRole {
    fn from(s: String) -> Self {
        UserRole::from(s.as_str())
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the caller, as supplied (and already trusted) by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requester {
    pub user_id: String,
    #[serde(rename = "userRole")]
    pub role: UserRole,
}

impl Requester {
    pub fn new(user_id: impl Into<String>, role: impl Into<UserRole>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
        }
    }
}

// =============================================================================
// COACH NOTE
// =============================================================================

/// A private coach note as stored by the notes subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachNote {
    pub id: Uuid,
    /// Owning coach's user id.
    pub coach_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Free-text body the text index is built from.
    pub searchable_content: String,
    /// Tag set; equality is case-sensitive.
    #[serde(default)]
    pub tags: Vec<String>,
    pub access_level: AccessLevel,
    /// User ids granted explicit access regardless of level.
    #[serde(default)]
    pub shared_with: Vec<String>,
    /// Reference to an attached audio recording, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl CoachNote {
    pub fn has_audio(&self) -> bool {
        self.audio_url
            .as_deref()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn is_shared_with(&self, user_id: &str) -> bool {
        self.shared_with.iter().any(|u| u == user_id)
    }
}

/// Request for creating a coach note.
#[derive(Debug, Clone)]
pub struct CreateCoachNoteRequest {
    pub coach_id: String,
    pub session_id: Option<String>,
    pub client_id: Option<String>,
    pub title: Option<String>,
    pub searchable_content: String,
    pub tags: Vec<String>,
    pub access_level: AccessLevel,
    pub shared_with: Vec<String>,
    pub audio_url: Option<String>,
    /// Creation time override (imports, tests); defaults to now.
    pub created_at: Option<DateTime<Utc>>,
}

impl CreateCoachNoteRequest {
    pub fn new(coach_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            coach_id: coach_id.into(),
            session_id: None,
            client_id: None,
            title: None,
            searchable_content: content.into(),
            tags: Vec::new(),
            access_level: AccessLevel::Private,
            shared_with: Vec::new(),
            audio_url: None,
            created_at: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
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

    pub fn with_access_level(mut self, level: AccessLevel) -> Self {
        self.access_level = level;
        self
    }

    pub fn shared_with<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared_with = users.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_audio(mut self, audio_url: impl Into<String>) -> Self {
        self.audio_url = Some(audio_url.into());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }
}

// =============================================================================
// AUDIT
// =============================================================================

/// What happened to a note in an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Created,
    Viewed,
    Updated,
    Shared,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Viewed => "viewed",
            Self::Updated => "updated",
            Self::Shared => "shared",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "viewed" => Ok(Self::Viewed),
            "updated" => Ok(Self::Updated),
            "shared" => Ok(Self::Shared),
            _ => Err(format!("Invalid audit action: {}", s)),
        }
    }
}

/// One append-only access/modification event on a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteAuditEntry {
    pub note_id: Uuid,
    pub actor_id: String,
    pub action: AuditAction,
    pub occurred_at: DateTime<Utc>,
}

// =============================================================================
// SEARCH OUTPUT ROWS
// =============================================================================

/// A note returned by search, with informational computed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSearchHit {
    #[serde(flatten)]
    pub note: CoachNote,
    pub has_audio: bool,
    pub tag_count: usize,
    pub audit_count: usize,
    /// Opaque relevance score from the text engine; only present when a text
    /// constraint was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl NoteSearchHit {
    pub fn new(note: CoachNote, audit_count: usize, score: Option<f32>) -> Self {
        Self {
            has_audio: note.has_audio(),
            tag_count: note.tags.len(),
            audit_count,
            score,
            note,
        }
    }
}

/// Usage count for one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}
