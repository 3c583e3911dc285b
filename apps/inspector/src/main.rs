//! Rollcall permission inspector.
//!
//! Resolves what one role, or one user of that role, can reach on the school
//! dashboard and logs the visible navigation with every resource's level.

#![forbid(unsafe_code)]

use std::env;
use std::str::FromStr;
use std::sync::Arc;

use rollcall_application::{
    AccessService, MenuVisibility, PermissionInvalidation, PermissionSettingsService,
    ProjectedMenuNode,
};
use rollcall_core::{AppError, AppResult};
use rollcall_domain::{AccessManifest, Actor, Role, UserRef};
use rollcall_infrastructure::{HttpOverrideStore, HttpOverrideStoreConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct InspectorConfig {
    store: HttpOverrideStoreConfig,
    actor: Actor,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = InspectorConfig::load()?;
    let manifest = AccessManifest::bundled()?;
    let store = Arc::new(HttpOverrideStore::from_config(config.store.clone())?);

    info!(
        actor = %config.actor,
        api_base_url = %config.store.base_url,
        max_attempts = config.store.max_attempts,
        "rollcall-inspector started"
    );

    let settings = PermissionSettingsService::new(
        store.clone(),
        manifest.clone(),
        PermissionInvalidation::new(),
    );
    settings.inspect(config.actor.clone()).await?;

    for row in settings.rows().await? {
        info!(
            resource_key = %row.resource_key,
            level = row.classification.as_str(),
            source = row.effective.source.as_str(),
            view = row.effective.permission.view(),
            create = row.effective.permission.create(),
            edit = row.effective.permission.edit(),
            delete = row.effective.permission.delete(),
            "resolved permission"
        );
    }

    let access = AccessService::new(store, manifest);
    let menu = access.visible_menu(&config.actor).await?;
    if menu.is_empty() {
        warn!(actor = %config.actor, "no menu entries are visible");
    }
    for node in &menu.nodes {
        log_menu_node(node, 0);
    }

    Ok(())
}

fn log_menu_node(node: &ProjectedMenuNode, depth: usize) {
    let visibility = match node.visibility {
        MenuVisibility::Accessible => "accessible",
        MenuVisibility::Container => "container",
    };
    info!(
        depth,
        name = %node.name,
        label = %node.label,
        visibility,
        "visible menu entry"
    );

    for child in &node.children {
        log_menu_node(child, depth.saturating_add(1));
    }
}

impl InspectorConfig {
    fn load() -> AppResult<Self> {
        let store = HttpOverrideStoreConfig::from_env()?;
        let role = Role::from_str(required_env("INSPECT_ROLE")?.trim())?;
        let actor = match optional_env("INSPECT_USER") {
            Some(user) => Actor::for_user(role, UserRef::new(user)?),
            None => Actor::for_role(role),
        };

        Ok(Self { store, actor })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
