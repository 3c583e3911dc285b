use std::cmp::Ordering;
use std::str::FromStr;

use rollcall_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::{PermissionValue, ResourceKey, Role, UserRef};

/// Kind of subject an override applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// Override applies to every holder of a role.
    Role,
    /// Override applies to one user.
    User,
}

impl TargetType {
    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::User => "user",
        }
    }
}

impl FromStr for TargetType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "role" => Ok(Self::Role),
            "user" => Ok(Self::User),
            _ => Err(AppError::Validation(format!(
                "unknown override target type '{value}'"
            ))),
        }
    }
}

/// Subject an override record is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target_type", content = "target_id", rename_all = "snake_case")]
pub enum OverrideTarget {
    /// Role-wide override.
    Role(Role),
    /// Individual user override.
    User(UserRef),
}

impl OverrideTarget {
    /// Parses transport `target_type` and `target_id` values.
    pub fn parse(target_type: &str, target_id: &str) -> AppResult<Self> {
        match TargetType::from_str(target_type)? {
            TargetType::Role => Ok(Self::Role(Role::from_str(target_id)?)),
            TargetType::User => Ok(Self::User(UserRef::new(target_id)?)),
        }
    }

    /// Returns the target type.
    #[must_use]
    pub fn target_type(&self) -> TargetType {
        match self {
            Self::Role(_) => TargetType::Role,
            Self::User(_) => TargetType::User,
        }
    }

    /// Returns the target identifier as sent to the backend.
    #[must_use]
    pub fn target_id(&self) -> &str {
        match self {
            Self::Role(role) => role.as_str(),
            Self::User(user) => user.as_str(),
        }
    }
}

impl std::fmt::Display for OverrideTarget {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}:{}",
            self.target_type().as_str(),
            self.target_id()
        )
    }
}

/// Identifier assigned by the override store on creation.
///
/// Numeric identifiers order numerically and before any other identifier;
/// the rest order lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideId(NonEmptyString);

impl Ord for OverrideId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (
            self.as_str().parse::<u64>(),
            other.as_str().parse::<u64>(),
        ) {
            (Ok(left), Ok(right)) => left
                .cmp(&right)
                .then_with(|| self.as_str().cmp(other.as_str())),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.as_str().cmp(other.as_str()),
        }
    }
}

impl PartialOrd for OverrideId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl OverrideId {
    /// Creates a validated override identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        Ok(Self(NonEmptyString::new(value)?))
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for OverrideId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Override record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOverrideRecord {
    /// Subject the override applies to.
    pub target: OverrideTarget,
    /// Overridden resource key.
    pub resource_key: ResourceKey,
    /// Capability granted instead of the inherited value.
    pub permission: PermissionValue,
}

impl NewOverrideRecord {
    /// Attaches a store-assigned identifier.
    #[must_use]
    pub fn with_id(self, id: OverrideId) -> OverrideRecord {
        OverrideRecord {
            id,
            target: self.target,
            resource_key: self.resource_key,
            permission: self.permission,
        }
    }
}

/// Persisted exception to the inherited permission of one target on one key.
///
/// At most one record exists per `(target, resource_key)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRecord {
    /// Store-assigned identifier.
    pub id: OverrideId,
    /// Subject the override applies to.
    pub target: OverrideTarget,
    /// Overridden resource key.
    pub resource_key: ResourceKey,
    /// Capability granted instead of the inherited value.
    pub permission: PermissionValue,
}

impl OverrideRecord {
    /// Returns whether this record occupies the unique slot of `target` and `resource_key`.
    #[must_use]
    pub fn same_slot(&self, target: &OverrideTarget, resource_key: &ResourceKey) -> bool {
        &self.target == target && &self.resource_key == resource_key
    }
}

#[cfg(test)]
mod tests {
    use super::{OverrideId, OverrideTarget, TargetType};
    use crate::Role;

    fn id(value: &str) -> OverrideId {
        OverrideId::new(value).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn numeric_ids_order_numerically_before_opaque_ids() {
        let mut ids = vec![id("ovr-b"), id("10"), id("ovr-a"), id("9")];
        ids.sort();
        let ordered: Vec<&str> = ids.iter().map(OverrideId::as_str).collect();
        assert_eq!(ordered, vec!["9", "10", "ovr-a", "ovr-b"]);
    }

    #[test]
    fn role_target_parses_from_transport_values() {
        let target = OverrideTarget::parse("role", "finance_officer");
        assert_eq!(target, Ok(OverrideTarget::Role(Role::FinanceOfficer)));
    }

    #[test]
    fn user_target_keeps_identifier() {
        let target = OverrideTarget::parse("user", "student-204");
        assert!(target.is_ok());
        let target = target.unwrap_or(OverrideTarget::Role(Role::Admin));
        assert_eq!(target.target_type(), TargetType::User);
        assert_eq!(target.target_id(), "student-204");
        assert_eq!(target.to_string(), "user:student-204");
    }

    #[test]
    fn invalid_targets_are_rejected() {
        assert!(OverrideTarget::parse("group", "teacher").is_err());
        assert!(OverrideTarget::parse("role", "janitor").is_err());
        assert!(OverrideTarget::parse("user", "  ").is_err());
    }
}
