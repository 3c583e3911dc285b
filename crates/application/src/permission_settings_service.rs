use std::collections::BTreeMap;
use std::sync::Arc;

use rollcall_core::{AppError, AppResult};
use rollcall_domain::{
    AccessClassification, AccessLevel, AccessManifest, Actor, CapabilityTable, MenuTree,
    OverrideRecord, OverrideTarget, PermissionValue, ResourceKey, classify,
};
use tokio::sync::Mutex;

use crate::access_service::fetch_overrides;
use crate::{
    EffectivePermissions, OverrideSet, OverrideStore, PermissionInvalidation, ProjectedMenu,
    ResolvedPermission,
};

mod save;

pub use save::{SaveFailure, SaveReport};

/// One line of the permission settings matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRow {
    /// Resource the row edits.
    pub resource_key: ResourceKey,
    /// Value currently in force for the inspected target.
    pub effective: ResolvedPermission,
    /// Preset matching the effective value.
    pub classification: AccessClassification,
    /// Unsaved selection, if the operator changed this row.
    pub pending: Option<PermissionValue>,
}

impl PermissionRow {
    /// Returns the value the selector should display.
    #[must_use]
    pub fn displayed(&self) -> PermissionValue {
        self.pending.unwrap_or(self.effective.permission)
    }

    /// Returns the preset matching the displayed value.
    #[must_use]
    pub fn displayed_classification(&self) -> AccessClassification {
        classify(self.displayed())
    }
}

/// Override layers fetched together for one inspected actor.
#[derive(Debug, Clone)]
struct FetchedLayers {
    role_overrides: OverrideSet,
    user_overrides: Option<OverrideSet>,
    target_records: Vec<OverrideRecord>,
}

impl FetchedLayers {
    fn permissions(&self, actor: &Actor, table: Arc<CapabilityTable>) -> EffectivePermissions {
        EffectivePermissions::new(
            actor.clone(),
            table,
            self.role_overrides.clone(),
            self.user_overrides.clone(),
        )
    }
}

#[derive(Debug, Default)]
struct SettingsState {
    generation: u64,
    inspected: Option<Actor>,
    layers: Option<FetchedLayers>,
    pending: BTreeMap<ResourceKey, PermissionValue>,
    load_error: Option<String>,
}

/// Editing session behind the permission settings page.
///
/// Tracks the inspected role or user, the operator's unsaved selections and
/// the last fetched override layers. Fetches are tagged with the selection
/// they were issued for; results that arrive after the operator moved on are
/// dropped.
#[derive(Clone)]
pub struct PermissionSettingsService {
    store: Arc<dyn OverrideStore>,
    table: Arc<CapabilityTable>,
    menu: Arc<MenuTree>,
    invalidation: PermissionInvalidation,
    state: Arc<Mutex<SettingsState>>,
}

impl PermissionSettingsService {
    /// Creates a new settings session.
    #[must_use]
    pub fn new(
        store: Arc<dyn OverrideStore>,
        manifest: AccessManifest,
        invalidation: PermissionInvalidation,
    ) -> Self {
        let (menu, table) = manifest.into_parts();
        Self {
            store,
            table: Arc::new(table),
            menu: Arc::new(menu),
            invalidation,
            state: Arc::new(Mutex::new(SettingsState::default())),
        }
    }

    /// Switches the session to `actor` and loads its overrides.
    ///
    /// Unsaved selections of the previous target are discarded.
    pub async fn inspect(&self, actor: Actor) -> AppResult<()> {
        let generation = {
            let mut state = self.state.lock().await;
            state.generation = state.generation.wrapping_add(1);
            state.inspected = Some(actor.clone());
            state.layers = None;
            state.pending.clear();
            state.load_error = None;
            state.generation
        };

        self.load(generation, &actor).await
    }

    /// Reloads the overrides of the inspected target.
    pub async fn refresh(&self) -> AppResult<()> {
        let (generation, actor) = self.current_selection().await?;
        self.load(generation, &actor).await
    }

    /// Returns the inspected role or user.
    pub async fn inspected(&self) -> Option<Actor> {
        self.state.lock().await.inspected.clone()
    }

    /// Returns the message of the last failed load, if the page shows stale data.
    pub async fn load_error(&self) -> Option<String> {
        self.state.lock().await.load_error.clone()
    }

    /// Records a preset chosen by the operator.
    pub async fn select_level(
        &self,
        resource_key: ResourceKey,
        level: AccessLevel,
    ) -> AppResult<()> {
        self.select_permission(resource_key, level.permission()).await
    }

    /// Records an explicit flag combination chosen by the operator.
    pub async fn select_permission(
        &self,
        resource_key: ResourceKey,
        permission: PermissionValue,
    ) -> AppResult<()> {
        if !self.table.contains(&resource_key) {
            return Err(AppError::Validation(format!(
                "resource key '{resource_key}' has no capability defaults"
            )));
        }

        let mut state = self.state.lock().await;
        if state.inspected.is_none() {
            return Err(AppError::Validation(
                "select a role or user before changing permissions".to_owned(),
            ));
        }
        state.pending.insert(resource_key, permission);
        Ok(())
    }

    /// Drops the unsaved selection for `resource_key`.
    pub async fn discard_selection(&self, resource_key: &ResourceKey) {
        self.state.lock().await.pending.remove(resource_key);
    }

    /// Returns unsaved selections.
    pub async fn pending(&self) -> BTreeMap<ResourceKey, PermissionValue> {
        self.state.lock().await.pending.clone()
    }

    /// Returns the settings matrix for the inspected target, ordered by key.
    pub async fn rows(&self) -> AppResult<Vec<PermissionRow>> {
        let state = self.state.lock().await;
        let (actor, layers) = Self::loaded(&state)?;
        let permissions = layers.permissions(actor, self.table.clone());

        Ok(self
            .table
            .keys()
            .map(|resource_key| {
                let effective = permissions.resolve_detailed(resource_key);
                PermissionRow {
                    resource_key: resource_key.clone(),
                    effective,
                    classification: classify(effective.permission),
                    pending: state.pending.get(resource_key).copied(),
                }
            })
            .collect())
    }

    /// Returns the navigation the inspected target currently sees.
    pub async fn visible_menu(&self) -> AppResult<ProjectedMenu> {
        let state = self.state.lock().await;
        let (actor, layers) = Self::loaded(&state)?;
        Ok(layers
            .permissions(actor, self.table.clone())
            .visible_menu(&self.menu))
    }

    fn loaded(state: &SettingsState) -> AppResult<(&Actor, &FetchedLayers)> {
        let actor = state.inspected.as_ref().ok_or_else(|| {
            AppError::Validation("no role or user is being inspected".to_owned())
        })?;
        let layers = state.layers.as_ref().ok_or_else(|| {
            AppError::Unavailable(
                state
                    .load_error
                    .clone()
                    .unwrap_or_else(|| "unable to load current permissions".to_owned()),
            )
        })?;
        Ok((actor, layers))
    }

    async fn current_selection(&self) -> AppResult<(u64, Actor)> {
        let state = self.state.lock().await;
        let actor = state.inspected.clone().ok_or_else(|| {
            AppError::Validation("no role or user is being inspected".to_owned())
        })?;
        Ok((state.generation, actor))
    }

    async fn load(&self, generation: u64, actor: &Actor) -> AppResult<()> {
        let fetched = self.fetch_layers(actor).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(
                actor = %actor,
                "discarding permission overrides fetched for a previous selection"
            );
            return Ok(());
        }

        match fetched {
            Ok(layers) => {
                state.layers = Some(layers);
                state.load_error = None;
                Ok(())
            }
            Err(error) => {
                state.load_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    async fn fetch_layers(&self, actor: &Actor) -> AppResult<FetchedLayers> {
        let role_target = OverrideTarget::Role(actor.role());
        let role_records = fetch_overrides(self.store.as_ref(), &role_target).await?;

        match actor.user() {
            Some(user) => {
                let user_target = OverrideTarget::User(user.clone());
                let user_records = fetch_overrides(self.store.as_ref(), &user_target).await?;
                Ok(FetchedLayers {
                    role_overrides: OverrideSet::from_records(role_target, role_records),
                    user_overrides: Some(OverrideSet::from_records(
                        user_target,
                        user_records.clone(),
                    )),
                    target_records: user_records,
                })
            }
            None => Ok(FetchedLayers {
                role_overrides: OverrideSet::from_records(role_target, role_records.clone()),
                user_overrides: None,
                target_records: role_records,
            }),
        }
    }
}
