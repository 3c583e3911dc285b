//! Application services and ports.

#![forbid(unsafe_code)]

mod access_service;
mod invalidation;
mod menu_visibility;
mod override_ports;
mod permission_settings_service;
mod resolution;
mod save_planner;

#[cfg(test)]
mod test_support;

pub use access_service::AccessService;
pub use invalidation::{PermissionInvalidation, PermissionsChanged};
pub use menu_visibility::{MenuVisibility, ProjectedMenu, ProjectedMenuNode, project_menu};
pub use override_ports::OverrideStore;
pub use permission_settings_service::{
    PermissionRow, PermissionSettingsService, SaveFailure, SaveReport,
};
pub use resolution::{
    EffectivePermissions, OverrideSet, PermissionResolver, PermissionSource, ResolvedPermission,
};
pub use save_planner::{PlannedOperation, SavePlan, plan_save};
