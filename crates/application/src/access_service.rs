use std::sync::Arc;

use rollcall_core::{AppError, AppResult};
use rollcall_domain::{
    AccessManifest, Actor, CapabilityTable, MenuTree, OverrideRecord, OverrideTarget,
    ResourceAction, ResourceKey,
};

use crate::{EffectivePermissions, OverrideSet, OverrideStore, ProjectedMenu};

/// Loads effective permissions for page gates and navigation.
///
/// Nothing is cached between calls: every pass fetches the override layers
/// again so edits made by other operators are picked up.
#[derive(Clone)]
pub struct AccessService {
    store: Arc<dyn OverrideStore>,
    table: Arc<CapabilityTable>,
    menu: Arc<MenuTree>,
}

impl AccessService {
    /// Creates a new access service.
    #[must_use]
    pub fn new(store: Arc<dyn OverrideStore>, manifest: AccessManifest) -> Self {
        let (menu, table) = manifest.into_parts();
        Self {
            store,
            table: Arc::new(table),
            menu: Arc::new(menu),
        }
    }

    /// Returns the navigation tree.
    #[must_use]
    pub fn menu(&self) -> &MenuTree {
        &self.menu
    }

    /// Returns the compiled capability defaults.
    #[must_use]
    pub fn table(&self) -> &CapabilityTable {
        &self.table
    }

    /// Fetches both override layers for `actor` and returns a resolution snapshot.
    pub async fn effective_permissions(&self, actor: &Actor) -> AppResult<EffectivePermissions> {
        let role_target = OverrideTarget::Role(actor.role());
        let role_records = fetch_overrides(self.store.as_ref(), &role_target).await?;
        let role_overrides = OverrideSet::from_records(role_target, role_records);

        let user_overrides = match actor.user() {
            Some(user) => {
                let user_target = OverrideTarget::User(user.clone());
                let records = fetch_overrides(self.store.as_ref(), &user_target).await?;
                Some(OverrideSet::from_records(user_target, records))
            }
            None => None,
        };

        Ok(EffectivePermissions::new(
            actor.clone(),
            self.table.clone(),
            role_overrides,
            user_overrides,
        ))
    }

    /// Returns the navigation entries `actor` may see.
    pub async fn visible_menu(&self, actor: &Actor) -> AppResult<ProjectedMenu> {
        let permissions = self.effective_permissions(actor).await?;
        Ok(permissions.visible_menu(&self.menu))
    }

    /// Ensures `actor` may perform `action` on `key`.
    pub async fn require(
        &self,
        actor: &Actor,
        key: &ResourceKey,
        action: ResourceAction,
    ) -> AppResult<()> {
        self.effective_permissions(actor)
            .await?
            .require(key, action)
    }
}

/// Lists overrides of `target`, reporting failures as unavailable state.
pub(crate) async fn fetch_overrides(
    store: &dyn OverrideStore,
    target: &OverrideTarget,
) -> AppResult<Vec<OverrideRecord>> {
    store.list_overrides(target).await.map_err(|error| {
        tracing::warn!(
            override_target = %target,
            error = %error,
            "failed to list permission overrides"
        );
        AppError::Unavailable(format!("unable to load current permissions: {error}"))
    })
}
