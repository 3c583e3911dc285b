use rollcall_domain::{MenuNode, MenuTree, PermissionValue, ResourceKey};

/// How a visible menu entry is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuVisibility {
    /// The entry's own resource is viewable; its actions are available.
    Accessible,
    /// Shown only to group viewable children; exposes no actions of its own.
    Container,
}

/// Menu entry that survived permission filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedMenuNode {
    /// Stable node name.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Own resource key, when the entry has one.
    pub key: Option<ResourceKey>,
    /// Rendering mode.
    pub visibility: MenuVisibility,
    /// Capability exposed by the entry itself. Always empty for containers.
    pub permission: PermissionValue,
    /// Visible children in declaration order.
    pub children: Vec<ProjectedMenuNode>,
}

/// Navigation tree filtered for one actor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectedMenu {
    /// Visible top-level entries.
    pub nodes: Vec<ProjectedMenuNode>,
}

impl ProjectedMenu {
    /// Finds the visible entry bound to `key`.
    #[must_use]
    pub fn find(&self, key: &ResourceKey) -> Option<&ProjectedMenuNode> {
        let mut stack: Vec<&ProjectedMenuNode> = self.nodes.iter().collect();
        while let Some(node) = stack.pop() {
            if node.key.as_ref() == Some(key) {
                return Some(node);
            }
            stack.extend(node.children.iter());
        }
        None
    }

    /// Returns whether the entry bound to `key` is rendered.
    #[must_use]
    pub fn is_visible(&self, key: &ResourceKey) -> bool {
        self.find(key).is_some()
    }

    /// Returns whether nothing is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Filters `menu` with the resolved permission of each key.
///
/// A leaf is kept when its own `view` flag is set. A group is kept when its own
/// `view` flag is set or when at least one descendant is kept; in the latter
/// case it becomes a [`MenuVisibility::Container`].
pub fn project_menu<F>(menu: &MenuTree, resolve: F) -> ProjectedMenu
where
    F: Fn(&ResourceKey) -> PermissionValue,
{
    ProjectedMenu {
        nodes: menu
            .roots()
            .iter()
            .filter_map(|node| project_node(node, &resolve))
            .collect(),
    }
}

fn project_node<F>(node: &MenuNode, resolve: &F) -> Option<ProjectedMenuNode>
where
    F: Fn(&ResourceKey) -> PermissionValue,
{
    let own = node.key().map(resolve).unwrap_or(PermissionValue::NONE);
    let children: Vec<ProjectedMenuNode> = node
        .children()
        .iter()
        .filter_map(|child| project_node(child, resolve))
        .collect();

    let (visibility, permission) = if own.view() {
        (MenuVisibility::Accessible, own)
    } else if !children.is_empty() {
        (MenuVisibility::Container, PermissionValue::NONE)
    } else {
        return None;
    };

    Some(ProjectedMenuNode {
        name: node.name().as_str().to_owned(),
        label: node.label().as_str().to_owned(),
        key: node.key().cloned(),
        visibility,
        permission,
        children,
    })
}
