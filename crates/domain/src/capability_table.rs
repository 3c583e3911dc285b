use std::collections::BTreeMap;

use rollcall_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::{AccessLevel, MenuTree, PermissionValue, ResourceKey, Role};

/// Default permission written either as a preset name or as explicit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultPermission {
    /// Catalog preset such as `view+edit`.
    Preset(AccessLevel),
    /// Explicit flag tuple for values no preset covers.
    Flags(PermissionValue),
}

impl DefaultPermission {
    /// Returns the permission value this default stands for.
    #[must_use]
    pub fn permission(&self) -> PermissionValue {
        match self {
            Self::Preset(level) => level.permission(),
            Self::Flags(value) => *value,
        }
    }
}

/// Default permission of every role for one resource key.
///
/// One field per role, so a configured key always covers the whole role set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleDefaults {
    /// Default for [`Role::Admin`].
    pub admin: DefaultPermission,
    /// Default for [`Role::HeadOfSchool`].
    pub head_of_school: DefaultPermission,
    /// Default for [`Role::Teacher`].
    pub teacher: DefaultPermission,
    /// Default for [`Role::Student`].
    pub student: DefaultPermission,
    /// Default for [`Role::FinanceOfficer`].
    pub finance_officer: DefaultPermission,
    /// Default for [`Role::Parent`].
    pub parent: DefaultPermission,
}

impl RoleDefaults {
    /// Uses the same default for every role.
    #[must_use]
    pub fn uniform(value: PermissionValue) -> Self {
        let value = DefaultPermission::Flags(value);
        Self {
            admin: value,
            head_of_school: value,
            teacher: value,
            student: value,
            finance_officer: value,
            parent: value,
        }
    }

    /// Returns a copy with `role` set to `value`.
    #[must_use]
    pub fn with(mut self, role: Role, value: PermissionValue) -> Self {
        let value = DefaultPermission::Flags(value);
        match role {
            Role::Admin => self.admin = value,
            Role::HeadOfSchool => self.head_of_school = value,
            Role::Teacher => self.teacher = value,
            Role::Student => self.student = value,
            Role::FinanceOfficer => self.finance_officer = value,
            Role::Parent => self.parent = value,
        }
        self
    }

    /// Returns the default for `role`.
    #[must_use]
    pub fn get(&self, role: Role) -> PermissionValue {
        match role {
            Role::Admin => self.admin,
            Role::HeadOfSchool => self.head_of_school,
            Role::Teacher => self.teacher,
            Role::Student => self.student,
            Role::FinanceOfficer => self.finance_officer,
            Role::Parent => self.parent,
        }
        .permission()
    }
}

/// Compiled mapping from `(role, resource key)` to the default permission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapabilityTable {
    entries: BTreeMap<ResourceKey, RoleDefaults>,
}

impl CapabilityTable {
    /// Builds a table, rejecting keys configured more than once.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (ResourceKey, RoleDefaults)>,
    ) -> AppResult<Self> {
        let mut table = BTreeMap::new();
        for (key, defaults) in entries {
            if table.contains_key(&key) {
                return Err(AppError::Validation(format!(
                    "capability defaults for '{key}' are declared more than once"
                )));
            }
            table.insert(key, defaults);
        }

        Ok(Self { entries: table })
    }

    /// Returns the configured default, or `None` when the key is unknown.
    #[must_use]
    pub fn lookup(&self, role: Role, key: &ResourceKey) -> Option<PermissionValue> {
        self.entries.get(key).map(|defaults| defaults.get(role))
    }

    /// Returns the default for `role` on `key`, failing closed for unknown keys.
    ///
    /// Tables are checked with [`CapabilityTable::validate_covers`] when loaded,
    /// so an unknown key here means the caller asked about a key outside the
    /// configured navigation.
    #[must_use]
    pub fn default_for(&self, role: Role, key: &ResourceKey) -> PermissionValue {
        self.lookup(role, key).unwrap_or(PermissionValue::NONE)
    }

    /// Returns whether defaults exist for `key`.
    #[must_use]
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns configured keys in lexical order.
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.entries.keys()
    }

    /// Fails when the menu references a key without configured defaults.
    pub fn validate_covers(&self, menu: &MenuTree) -> AppResult<()> {
        let missing: Vec<&str> = menu
            .resource_keys()
            .into_iter()
            .filter(|key| !self.contains(key))
            .map(ResourceKey::as_str)
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        Err(AppError::Validation(format!(
            "menu references resource keys without capability defaults: {}",
            missing.join(", ")
        )))
    }
}
