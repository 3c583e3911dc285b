use rollcall_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::{OverrideTarget, Role};

/// Identifier of one user account as known by the backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(NonEmptyString);

impl UserRef {
    /// Creates a validated user reference.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        Ok(Self(NonEmptyString::new(value)?))
    }

    /// Returns the user identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for UserRef {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Subject whose permissions are resolved: a role and optionally a specific user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    role: Role,
    user: Option<UserRef>,
}

impl Actor {
    /// Creates an actor that only carries a role.
    #[must_use]
    pub fn for_role(role: Role) -> Self {
        Self { role, user: None }
    }

    /// Creates an actor for a specific user holding `role`.
    #[must_use]
    pub fn for_user(role: Role, user: UserRef) -> Self {
        Self {
            role,
            user: Some(user),
        }
    }

    /// Returns the actor role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the specific user, if any.
    #[must_use]
    pub fn user(&self) -> Option<&UserRef> {
        self.user.as_ref()
    }

    /// Returns the override layer owned by this actor: the user when present,
    /// otherwise the role.
    #[must_use]
    pub fn override_target(&self) -> OverrideTarget {
        match &self.user {
            Some(user) => OverrideTarget::User(user.clone()),
            None => OverrideTarget::Role(self.role),
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.user {
            Some(user) => write!(formatter, "{user} ({})", self.role),
            None => write!(formatter, "{}", self.role),
        }
    }
}
