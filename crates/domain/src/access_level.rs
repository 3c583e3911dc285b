use std::str::FromStr;

use rollcall_core::AppError;
use serde::{Deserialize, Serialize};

use crate::PermissionValue;

/// Named access level preset offered by the permission selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    /// No capability.
    #[serde(rename = "none")]
    None,
    /// Read-only access.
    #[serde(rename = "view-only")]
    ViewOnly,
    /// Read access plus creating records.
    #[serde(rename = "view+create")]
    ViewCreate,
    /// Read access plus editing records.
    #[serde(rename = "view+edit")]
    ViewEdit,
    /// Every capability.
    #[serde(rename = "full")]
    Full,
}

impl AccessLevel {
    /// Returns the catalog in display order.
    ///
    /// The order also decides which preset wins in [`classify`].
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[AccessLevel] = &[
            AccessLevel::None,
            AccessLevel::ViewOnly,
            AccessLevel::ViewCreate,
            AccessLevel::ViewEdit,
            AccessLevel::Full,
        ];

        ALL
    }

    /// Returns the stable preset name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ViewOnly => "view-only",
            Self::ViewCreate => "view+create",
            Self::ViewEdit => "view+edit",
            Self::Full => "full",
        }
    }

    /// Returns the selector label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "No access",
            Self::ViewOnly => "View only",
            Self::ViewCreate => "View and create",
            Self::ViewEdit => "View and edit",
            Self::Full => "Full access",
        }
    }

    /// Returns the permission value this preset stands for.
    #[must_use]
    pub fn permission(&self) -> PermissionValue {
        match self {
            Self::None => PermissionValue::NONE,
            Self::ViewOnly => PermissionValue::new(true, false, false, false),
            Self::ViewCreate => PermissionValue::new(true, true, false, false),
            Self::ViewEdit => PermissionValue::new(true, false, true, false),
            Self::Full => PermissionValue::FULL,
        }
    }
}

impl FromStr for AccessLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|level| level.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown access level '{value}'")))
    }
}

/// Result of matching a permission value against the preset catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessClassification {
    /// The value equals this preset.
    Preset(AccessLevel),
    /// The value matches no preset.
    Custom,
}

impl AccessClassification {
    /// Returns the preset name or `custom`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preset(level) => level.as_str(),
            Self::Custom => "custom",
        }
    }

    /// Returns the matched preset, if any.
    #[must_use]
    pub fn preset(&self) -> Option<AccessLevel> {
        match self {
            Self::Preset(level) => Some(*level),
            Self::Custom => None,
        }
    }
}

/// Returns the first catalog preset equal to `permission`, or `Custom`.
#[must_use]
pub fn classify(permission: PermissionValue) -> AccessClassification {
    AccessLevel::all()
        .iter()
        .copied()
        .find(|level| level.permission() == permission)
        .map(AccessClassification::Preset)
        .unwrap_or(AccessClassification::Custom)
}
