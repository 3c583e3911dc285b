use std::collections::BTreeSet;

use rollcall_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::ResourceKey;

/// Navigation entry. Groups carry children; leaves carry a resource key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuNode {
    name: NonEmptyString,
    label: NonEmptyString,
    #[serde(default)]
    key: Option<ResourceKey>,
    #[serde(default)]
    children: Vec<MenuNode>,
}

impl MenuNode {
    /// Creates a leaf entry bound to a resource key.
    pub fn leaf(
        name: impl Into<String>,
        label: impl Into<String>,
        key: ResourceKey,
    ) -> AppResult<Self> {
        Ok(Self {
            name: NonEmptyString::new(name)?,
            label: NonEmptyString::new(label)?,
            key: Some(key),
            children: Vec::new(),
        })
    }

    /// Creates a group entry. A group without its own key is a pure container.
    pub fn group(
        name: impl Into<String>,
        label: impl Into<String>,
        key: Option<ResourceKey>,
        children: Vec<MenuNode>,
    ) -> AppResult<Self> {
        if children.is_empty() {
            return Err(AppError::Validation(
                "menu group must have at least one child".to_owned(),
            ));
        }

        Ok(Self {
            name: NonEmptyString::new(name)?,
            label: NonEmptyString::new(label)?,
            key,
            children,
        })
    }

    /// Returns the stable node name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the display label.
    #[must_use]
    pub fn label(&self) -> &NonEmptyString {
        &self.label
    }

    /// Returns the node's own resource key.
    #[must_use]
    pub fn key(&self) -> Option<&ResourceKey> {
        self.key.as_ref()
    }

    /// Returns child entries.
    #[must_use]
    pub fn children(&self) -> &[MenuNode] {
        &self.children
    }

    /// Returns whether this node has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Validated navigation tree of resource keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MenuTree {
    roots: Vec<MenuNode>,
}

impl MenuTree {
    /// Creates a validated menu tree.
    ///
    /// Leaves must carry a resource key, and no key or node name may appear twice.
    pub fn new(roots: Vec<MenuNode>) -> AppResult<Self> {
        let mut names = BTreeSet::new();
        let mut keys = BTreeSet::new();
        let mut stack: Vec<&MenuNode> = roots.iter().collect();

        while let Some(node) = stack.pop() {
            if !names.insert(node.name.as_str()) {
                return Err(AppError::Validation(format!(
                    "menu node name '{}' is declared more than once",
                    node.name
                )));
            }

            match &node.key {
                Some(key) => {
                    if !keys.insert(key.as_str()) {
                        return Err(AppError::Validation(format!(
                            "menu resource key '{key}' is declared more than once"
                        )));
                    }
                }
                None if node.is_leaf() => {
                    return Err(AppError::Validation(format!(
                        "menu leaf '{}' must declare a resource key",
                        node.name
                    )));
                }
                None => {}
            }

            stack.extend(node.children.iter());
        }

        Ok(Self { roots })
    }

    /// Returns top-level entries in display order.
    #[must_use]
    pub fn roots(&self) -> &[MenuNode] {
        &self.roots
    }

    /// Returns every resource key referenced by the tree, depth-first.
    #[must_use]
    pub fn resource_keys(&self) -> Vec<&ResourceKey> {
        fn collect<'a>(nodes: &'a [MenuNode], keys: &mut Vec<&'a ResourceKey>) {
            for node in nodes {
                if let Some(key) = node.key() {
                    keys.push(key);
                }
                collect(node.children(), keys);
            }
        }

        let mut keys = Vec::new();
        collect(&self.roots, &mut keys);
        keys
    }
}

impl<'de> Deserialize<'de> for MenuTree {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let roots = Vec::<MenuNode>::deserialize(deserializer)?;
        Self::new(roots).map_err(serde::de::Error::custom)
    }
}
