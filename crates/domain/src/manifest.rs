//! Navigation and default capabilities compiled into the dashboard.

use rollcall_core::{AppError, AppResult};
use serde::Deserialize;

use crate::{CapabilityTable, MenuTree, ResourceKey, RoleDefaults};

const BUNDLED_MANIFEST: &str = include_str!("../config/school_access.json");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestDocument {
    menu: MenuTree,
    capabilities: Vec<CapabilityDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CapabilityDocument {
    key: ResourceKey,
    defaults: RoleDefaults,
}

/// Menu tree and capability table loaded together and checked for coverage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessManifest {
    menu: MenuTree,
    table: CapabilityTable,
}

impl AccessManifest {
    /// Parses a manifest document and checks that every menu key has defaults.
    pub fn from_json(document: &str) -> AppResult<Self> {
        let document = serde_json::from_str::<ManifestDocument>(document).map_err(|error| {
            AppError::Validation(format!("invalid access manifest: {error}"))
        })?;

        let table = CapabilityTable::from_entries(
            document
                .capabilities
                .into_iter()
                .map(|entry| (entry.key, entry.defaults)),
        )?;
        table.validate_covers(&document.menu)?;

        Ok(Self {
            menu: document.menu,
            table,
        })
    }

    /// Loads the manifest shipped with the dashboard.
    pub fn bundled() -> AppResult<Self> {
        Self::from_json(BUNDLED_MANIFEST)
    }

    /// Returns the navigation tree.
    #[must_use]
    pub fn menu(&self) -> &MenuTree {
        &self.menu
    }

    /// Returns the default capability table.
    #[must_use]
    pub fn table(&self) -> &CapabilityTable {
        &self.table
    }

    /// Splits the manifest into its parts.
    #[must_use]
    pub fn into_parts(self) -> (MenuTree, CapabilityTable) {
        (self.menu, self.table)
    }
}
