use std::collections::BTreeMap;

use rollcall_domain::{
    NewOverrideRecord, OverrideId, OverrideRecord, OverrideTarget, PermissionValue, ResourceKey,
};

/// Store write required to make one key match the operator's selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedOperation {
    /// Persist a new override.
    Create(NewOverrideRecord),
    /// Change the permission of an existing override.
    Update {
        /// Existing override identifier.
        id: OverrideId,
        /// Full record sent to the store.
        record: NewOverrideRecord,
    },
    /// Remove an override so the target inherits again.
    Delete {
        /// Existing override identifier.
        id: OverrideId,
        /// Key the override was bound to.
        resource_key: ResourceKey,
    },
}

impl PlannedOperation {
    /// Returns the key this operation writes.
    #[must_use]
    pub fn resource_key(&self) -> &ResourceKey {
        match self {
            Self::Create(record) | Self::Update { record, .. } => &record.resource_key,
            Self::Delete { resource_key, .. } => resource_key,
        }
    }

    /// Returns a stable operation name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Minimal set of store writes for one save.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SavePlan {
    operations: Vec<PlannedOperation>,
}

impl SavePlan {
    /// Returns planned operations ordered by key.
    #[must_use]
    pub fn operations(&self) -> &[PlannedOperation] {
        &self.operations
    }

    /// Consumes the plan.
    #[must_use]
    pub fn into_operations(self) -> Vec<PlannedOperation> {
        self.operations
    }

    /// Returns whether the save needs no store write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the number of planned writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }
}

/// Diffs desired permissions against freshly fetched overrides of one target.
///
/// `inherited` returns the value the target has on a key once its own override
/// is removed. Selecting that value deletes the override instead of restating
/// it. `existing` must come from a fetch issued right before planning.
pub fn plan_save<F>(
    target: &OverrideTarget,
    desired: &BTreeMap<ResourceKey, PermissionValue>,
    existing: &[OverrideRecord],
    inherited: F,
) -> SavePlan
where
    F: Fn(&ResourceKey) -> PermissionValue,
{
    let mut by_key: BTreeMap<&ResourceKey, Vec<&OverrideRecord>> = BTreeMap::new();
    for record in existing.iter().filter(|record| &record.target == target) {
        by_key.entry(&record.resource_key).or_default().push(record);
    }

    let mut operations = Vec::new();
    for (resource_key, wanted) in desired {
        let mut records = by_key.remove(resource_key).unwrap_or_default();
        records.sort_by(|left, right| left.id.cmp(&right.id));
        let mut records = records.into_iter();
        let current = records.next();

        // Legacy duplicates of the slot are removed; the lowest id is kept.
        for duplicate in records {
            operations.push(PlannedOperation::Delete {
                id: duplicate.id.clone(),
                resource_key: resource_key.clone(),
            });
        }

        let base = inherited(resource_key);
        let operation = match current {
            Some(record) if *wanted == base => Some(PlannedOperation::Delete {
                id: record.id.clone(),
                resource_key: resource_key.clone(),
            }),
            None if *wanted == base => None,
            Some(record) if record.permission == *wanted => None,
            Some(record) => Some(PlannedOperation::Update {
                id: record.id.clone(),
                record: NewOverrideRecord {
                    target: target.clone(),
                    resource_key: resource_key.clone(),
                    permission: *wanted,
                },
            }),
            None => Some(PlannedOperation::Create(NewOverrideRecord {
                target: target.clone(),
                resource_key: resource_key.clone(),
                permission: *wanted,
            })),
        };
        operations.extend(operation);
    }

    SavePlan { operations }
}
