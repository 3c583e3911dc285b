//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod access_level;
mod actor;
mod capability_table;
mod manifest;
mod menu;
mod override_record;
mod permission;
mod resource;
mod role;

pub use access_level::{AccessClassification, AccessLevel, classify};
pub use actor::{Actor, UserRef};
pub use capability_table::{CapabilityTable, DefaultPermission, RoleDefaults};
pub use manifest::AccessManifest;
pub use menu::{MenuNode, MenuTree};
pub use override_record::{
    NewOverrideRecord, OverrideId, OverrideRecord, OverrideTarget, TargetType,
};
pub use permission::{PermissionValue, ResourceAction};
pub use resource::ResourceKey;
pub use role::Role;
