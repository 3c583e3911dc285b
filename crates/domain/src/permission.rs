use serde::{Deserialize, Serialize};

/// CRUD capability tuple for one resource key.
///
/// Flags are independent: `edit` does not imply `view`, and each flag is
/// authoritative on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionValue {
    view: bool,
    create: bool,
    edit: bool,
    delete: bool,
}

impl PermissionValue {
    /// No capability at all.
    pub const NONE: Self = Self::new(false, false, false, false);

    /// Every capability.
    pub const FULL: Self = Self::new(true, true, true, true);

    /// Creates a permission value from the four flags.
    #[must_use]
    pub const fn new(view: bool, create: bool, edit: bool, delete: bool) -> Self {
        Self {
            view,
            create,
            edit,
            delete,
        }
    }

    /// Returns whether the value grants viewing.
    #[must_use]
    pub fn view(&self) -> bool {
        self.view
    }

    /// Returns whether the value grants creating.
    #[must_use]
    pub fn create(&self) -> bool {
        self.create
    }

    /// Returns whether the value grants editing.
    #[must_use]
    pub fn edit(&self) -> bool {
        self.edit
    }

    /// Returns whether the value grants deleting.
    #[must_use]
    pub fn delete(&self) -> bool {
        self.delete
    }

    /// Returns whether the value allows the given action.
    #[must_use]
    pub fn allows(&self, action: ResourceAction) -> bool {
        match action {
            ResourceAction::View => self.view,
            ResourceAction::Create => self.create,
            ResourceAction::Edit => self.edit,
            ResourceAction::Delete => self.delete,
        }
    }

    /// Returns whether no flag is set.
    #[must_use]
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// Action checked by page-level permission gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAction {
    /// List and detail pages.
    View,
    /// Create forms.
    Create,
    /// Edit forms.
    Edit,
    /// Delete buttons and bulk delete.
    Delete,
}

impl ResourceAction {
    /// Returns stable action name for error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }

    /// Returns all actions in display order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[ResourceAction] = &[
            ResourceAction::View,
            ResourceAction::Create,
            ResourceAction::Edit,
            ResourceAction::Delete,
        ];

        ALL
    }
}
