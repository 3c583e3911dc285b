use std::collections::BTreeMap;
use std::sync::Arc;

use rollcall_core::{AppError, AppResult};
use rollcall_domain::{
    Actor, CapabilityTable, MenuTree, OverrideRecord, OverrideTarget, PermissionValue,
    ResourceAction, ResourceKey,
};

use crate::menu_visibility::{ProjectedMenu, project_menu};

/// Overrides of one target indexed by resource key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideSet {
    target: OverrideTarget,
    records: BTreeMap<ResourceKey, OverrideRecord>,
}

impl OverrideSet {
    /// Creates an empty set for `target`.
    #[must_use]
    pub fn empty(target: OverrideTarget) -> Self {
        Self {
            target,
            records: BTreeMap::new(),
        }
    }

    /// Indexes the records that belong to `target`.
    ///
    /// Records of other targets are ignored. When legacy data holds several
    /// records for one key, the lowest identifier wins.
    #[must_use]
    pub fn from_records(
        target: OverrideTarget,
        records: impl IntoIterator<Item = OverrideRecord>,
    ) -> Self {
        let mut indexed: BTreeMap<ResourceKey, OverrideRecord> = BTreeMap::new();
        for record in records {
            if record.target != target {
                continue;
            }

            match indexed.get(&record.resource_key) {
                Some(current) if current.id <= record.id => {}
                _ => {
                    indexed.insert(record.resource_key.clone(), record);
                }
            }
        }

        Self {
            target,
            records: indexed,
        }
    }

    /// Returns the target these overrides belong to.
    #[must_use]
    pub fn target(&self) -> &OverrideTarget {
        &self.target
    }

    /// Returns the override for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<&OverrideRecord> {
        self.records.get(key)
    }

    /// Returns the overridden permission for `key`, if any.
    #[must_use]
    pub fn permission(&self, key: &ResourceKey) -> Option<PermissionValue> {
        self.records.get(key).map(|record| record.permission)
    }

    /// Returns indexed records ordered by key.
    pub fn records(&self) -> impl Iterator<Item = &OverrideRecord> {
        self.records.values()
    }

    /// Returns the number of overridden keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether no key is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Layer a resolved permission came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionSource {
    /// Individual user override.
    UserOverride,
    /// Role-wide override.
    RoleOverride,
    /// Compiled capability default.
    Default,
}

impl PermissionSource {
    /// Returns a stable name for display and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserOverride => "user_override",
            Self::RoleOverride => "role_override",
            Self::Default => "default",
        }
    }
}

/// Effective permission together with the layer that supplied it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPermission {
    /// Effective capability.
    pub permission: PermissionValue,
    /// Layer that supplied the capability.
    pub source: PermissionSource,
}

/// The single place where override precedence is applied.
///
/// User overrides win over role overrides, which win over compiled defaults.
#[derive(Debug, Clone, Copy)]
pub struct PermissionResolver<'a> {
    table: &'a CapabilityTable,
    role_overrides: Option<&'a OverrideSet>,
    user_overrides: Option<&'a OverrideSet>,
}

impl<'a> PermissionResolver<'a> {
    /// Creates a resolver over the compiled defaults only.
    #[must_use]
    pub fn new(table: &'a CapabilityTable) -> Self {
        Self {
            table,
            role_overrides: None,
            user_overrides: None,
        }
    }

    /// Adds the role override layer.
    #[must_use]
    pub fn with_role_overrides(mut self, overrides: &'a OverrideSet) -> Self {
        self.role_overrides = Some(overrides);
        self
    }

    /// Adds the user override layer.
    #[must_use]
    pub fn with_user_overrides(mut self, overrides: &'a OverrideSet) -> Self {
        self.user_overrides = Some(overrides);
        self
    }

    /// Returns the effective permission of `actor` on `key`.
    #[must_use]
    pub fn resolve(&self, actor: &Actor, key: &ResourceKey) -> PermissionValue {
        self.resolve_detailed(actor, key).permission
    }

    /// Returns the effective permission and the layer it came from.
    #[must_use]
    pub fn resolve_detailed(&self, actor: &Actor, key: &ResourceKey) -> ResolvedPermission {
        if let Some(permission) = self.user_override(actor, key) {
            return ResolvedPermission {
                permission,
                source: PermissionSource::UserOverride,
            };
        }

        self.resolve_below_user(actor, key)
    }

    /// Returns what `actor` would resolve to without its own override layer.
    ///
    /// For a user actor this is the role-level result; for a role actor it is
    /// the compiled default.
    #[must_use]
    pub fn resolve_inherited(&self, actor: &Actor, key: &ResourceKey) -> ResolvedPermission {
        match actor.user() {
            Some(_) => self.resolve_below_user(actor, key),
            None => self.default_for(actor, key),
        }
    }

    fn resolve_below_user(&self, actor: &Actor, key: &ResourceKey) -> ResolvedPermission {
        if let Some(permission) = self.role_override(actor, key) {
            return ResolvedPermission {
                permission,
                source: PermissionSource::RoleOverride,
            };
        }

        self.default_for(actor, key)
    }

    fn default_for(&self, actor: &Actor, key: &ResourceKey) -> ResolvedPermission {
        let permission = match self.table.lookup(actor.role(), key) {
            Some(permission) => permission,
            None => {
                tracing::error!(
                    resource_key = %key,
                    role = %actor.role(),
                    "resource key has no capability default; denying access"
                );
                PermissionValue::NONE
            }
        };

        ResolvedPermission {
            permission,
            source: PermissionSource::Default,
        }
    }

    fn user_override(&self, actor: &Actor, key: &ResourceKey) -> Option<PermissionValue> {
        let user = actor.user()?;
        let overrides = self.user_overrides?;
        match overrides.target() {
            OverrideTarget::User(owner) if owner == user => overrides.permission(key),
            _ => None,
        }
    }

    fn role_override(&self, actor: &Actor, key: &ResourceKey) -> Option<PermissionValue> {
        let overrides = self.role_overrides?;
        match overrides.target() {
            OverrideTarget::Role(role) if *role == actor.role() => overrides.permission(key),
            _ => None,
        }
    }
}

/// Owned permission snapshot for one actor and one render pass.
#[derive(Debug, Clone)]
pub struct EffectivePermissions {
    actor: Actor,
    table: Arc<CapabilityTable>,
    role_overrides: OverrideSet,
    user_overrides: Option<OverrideSet>,
}

impl EffectivePermissions {
    /// Creates a snapshot from freshly fetched override layers.
    #[must_use]
    pub fn new(
        actor: Actor,
        table: Arc<CapabilityTable>,
        role_overrides: OverrideSet,
        user_overrides: Option<OverrideSet>,
    ) -> Self {
        Self {
            actor,
            table,
            role_overrides,
            user_overrides,
        }
    }

    /// Returns the actor this snapshot was resolved for.
    #[must_use]
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    fn resolver(&self) -> PermissionResolver<'_> {
        let resolver =
            PermissionResolver::new(&self.table).with_role_overrides(&self.role_overrides);
        match &self.user_overrides {
            Some(overrides) => resolver.with_user_overrides(overrides),
            None => resolver,
        }
    }

    /// Returns the effective permission on `key`.
    #[must_use]
    pub fn resolve(&self, key: &ResourceKey) -> PermissionValue {
        self.resolver().resolve(&self.actor, key)
    }

    /// Returns the effective permission on `key` and its source layer.
    #[must_use]
    pub fn resolve_detailed(&self, key: &ResourceKey) -> ResolvedPermission {
        self.resolver().resolve_detailed(&self.actor, key)
    }

    /// Returns what the actor inherits on `key` without its own override layer.
    #[must_use]
    pub fn resolve_inherited(&self, key: &ResourceKey) -> ResolvedPermission {
        self.resolver().resolve_inherited(&self.actor, key)
    }

    /// Returns whether list and detail pages for `key` are reachable.
    #[must_use]
    pub fn can_view(&self, key: &ResourceKey) -> bool {
        self.resolve(key).view()
    }

    /// Returns whether create forms for `key` are enabled.
    #[must_use]
    pub fn can_create(&self, key: &ResourceKey) -> bool {
        self.resolve(key).create()
    }

    /// Returns whether edit forms for `key` are enabled.
    #[must_use]
    pub fn can_edit(&self, key: &ResourceKey) -> bool {
        self.resolve(key).edit()
    }

    /// Returns whether delete actions for `key` are enabled.
    #[must_use]
    pub fn can_delete(&self, key: &ResourceKey) -> bool {
        self.resolve(key).delete()
    }

    /// Ensures the actor may perform `action` on `key`.
    ///
    /// Route guards redirect when this returns [`AppError::Forbidden`].
    pub fn require(&self, key: &ResourceKey, action: ResourceAction) -> AppResult<()> {
        if self.resolve(key).allows(action) {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "'{}' is missing '{}' access for resource '{}'",
            self.actor,
            action.as_str(),
            key
        )))
    }

    /// Projects the navigation tree for this actor.
    #[must_use]
    pub fn visible_menu(&self, menu: &MenuTree) -> ProjectedMenu {
        let resolver = self.resolver();
        project_menu(menu, |key| resolver.resolve(&self.actor, key))
    }
}
