//! Role-based visibility policy for coach notes.
//!
//! The role → access-level mapping is a static table rather than branching
//! logic, so the policy can be read, tested, and audited in one place.
//!
//! | role | levels visible on notes the user neither owns nor is shared on |
//! |------|------|
//! | admin | all (no scoping at all) |
//! | supervisor | supervisor, team, organization |
//! | coach | team, organization |
//! | anything else | none |
//!
//! Ownership and explicit sharing always grant access, whatever the role.

use serde::{Deserialize, Serialize};

use crate::models::{AccessLevel, CoachNote, Requester, UserRole};

/// Access levels each known role may see on notes it does not own.
pub const ACCESS_POLICY: &[(&str, &[AccessLevel])] = &[
    ("admin", &AccessLevel::ALL),
    (
        "supervisor",
        &[
            AccessLevel::Supervisor,
            AccessLevel::Team,
            AccessLevel::Organization,
        ],
    ),
    ("coach", &[AccessLevel::Team, AccessLevel::Organization]),
];

/// Levels `role` may see on notes it neither owns nor is shared on.
///
/// Unknown roles resolve to the empty set.
pub fn allowed_levels(role: &UserRole) -> &'static [AccessLevel] {
    let name = role.as_str();
    ACCESS_POLICY
        .iter()
        .find(|(policy_role, _)| *policy_role == name)
        .map(|(_, levels)| *levels)
        .unwrap_or(&[])
}

/// Candidate-set restriction applied before any other filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessScope {
    /// Admins see every note.
    Unrestricted,
    /// Owner OR shared-with OR level in `levels`.
    Restricted {
        user_id: String,
        levels: Vec<AccessLevel>,
    },
}

impl AccessScope {
    pub fn for_requester(requester: &Requester) -> Self {
        if requester.role.is_admin() {
            return Self::Unrestricted;
        }
        Self::Restricted {
            user_id: requester.user_id.clone(),
            levels: allowed_levels(&requester.role).to_vec(),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }

    /// Whether a note is visible under this scope.
    pub fn allows(&self, note: &CoachNote) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Restricted { user_id, levels } => {
                note.coach_id == *user_id
                    || note.is_shared_with(user_id)
                    || levels.contains(&note.access_level)
            }
        }
    }
}
