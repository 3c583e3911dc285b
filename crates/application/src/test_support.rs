use std::collections::BTreeSet;

use async_trait::async_trait;
use rollcall_core::{AppError, AppResult};
use rollcall_domain::{
    NewOverrideRecord, OverrideId, OverrideRecord, OverrideTarget, PermissionValue, ResourceKey,
};
use tokio::sync::{Mutex, Notify};

use crate::OverrideStore;

/// Override store double that records calls and can inject failures.
#[derive(Default)]
pub(crate) struct FakeOverrideStore {
    records: Mutex<Vec<OverrideRecord>>,
    next_id: Mutex<u64>,
    fail_lists: Mutex<bool>,
    failing_keys: Mutex<BTreeSet<String>>,
    writes: Mutex<Vec<String>>,
    list_calls: Mutex<usize>,
    held_target: Mutex<Option<(OverrideTarget, usize)>>,
    pub(crate) hold_started: Notify,
    pub(crate) hold_released: Notify,
}

impl FakeOverrideStore {
    pub(crate) async fn seed(
        &self,
        target: OverrideTarget,
        resource_key: &str,
        permission: PermissionValue,
    ) -> OverrideRecord {
        let record = NewOverrideRecord {
            target,
            resource_key: ResourceKey::new(resource_key).unwrap_or_else(|_| unreachable!()),
            permission,
        }
        .with_id(self.allocate_id().await);
        self.records.lock().await.push(record.clone());
        record
    }

    pub(crate) async fn push_raw(&self, record: OverrideRecord) {
        self.records.lock().await.push(record);
    }

    pub(crate) async fn fail_lists(&self, fail: bool) {
        *self.fail_lists.lock().await = fail;
    }

    pub(crate) async fn fail_writes_for(&self, resource_key: &str) {
        self.failing_keys
            .lock()
            .await
            .insert(resource_key.to_owned());
    }

    pub(crate) async fn hold_lists_for(&self, target: OverrideTarget) {
        self.hold_lists_for_after(target, 0).await;
    }

    /// Holds the list call for `target` that follows `skip` unheld ones.
    pub(crate) async fn hold_lists_for_after(&self, target: OverrideTarget, skip: usize) {
        *self.held_target.lock().await = Some((target, skip));
    }

    pub(crate) async fn writes(&self) -> Vec<String> {
        self.writes.lock().await.clone()
    }

    pub(crate) async fn list_calls(&self) -> usize {
        *self.list_calls.lock().await
    }

    pub(crate) async fn records(&self) -> Vec<OverrideRecord> {
        self.records.lock().await.clone()
    }

    async fn allocate_id(&self) -> OverrideId {
        let mut next_id = self.next_id.lock().await;
        *next_id += 1;
        OverrideId::new(format!("ovr-{:03}", *next_id)).unwrap_or_else(|_| unreachable!())
    }

    async fn check_write(&self, operation: &str, resource_key: &ResourceKey) -> AppResult<()> {
        self.writes
            .lock()
            .await
            .push(format!("{operation}:{resource_key}"));
        if self
            .failing_keys
            .lock()
            .await
            .contains(resource_key.as_str())
        {
            return Err(AppError::Unavailable(format!(
                "backend rejected write for '{resource_key}'"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl OverrideStore for FakeOverrideStore {
    async fn list_overrides(&self, target: &OverrideTarget) -> AppResult<Vec<OverrideRecord>> {
        *self.list_calls.lock().await += 1;

        let hold = {
            let mut held = self.held_target.lock().await;
            let remaining = held
                .as_ref()
                .and_then(|(held_target, skip)| (held_target == target).then_some(*skip));
            match remaining {
                Some(0) => {
                    *held = None;
                    true
                }
                Some(skip) => {
                    *held = Some((target.clone(), skip - 1));
                    false
                }
                None => false,
            }
        };
        if hold {
            self.hold_started.notify_one();
            self.hold_released.notified().await;
        }

        if *self.fail_lists.lock().await {
            return Err(AppError::Unavailable("backend offline".to_owned()));
        }

        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| &record.target == target)
            .cloned()
            .collect())
    }

    async fn create_override(&self, record: NewOverrideRecord) -> AppResult<OverrideRecord> {
        self.check_write("create", &record.resource_key).await?;
        if self
            .records
            .lock()
            .await
            .iter()
            .any(|stored| stored.same_slot(&record.target, &record.resource_key))
        {
            return Err(AppError::Conflict(format!(
                "override for '{}' already exists",
                record.resource_key
            )));
        }

        let record = record.with_id(self.allocate_id().await);
        self.records.lock().await.push(record.clone());
        Ok(record)
    }

    async fn update_override(&self, id: &OverrideId, record: NewOverrideRecord) -> AppResult<()> {
        self.check_write("update", &record.resource_key).await?;
        let mut records = self.records.lock().await;
        let stored = records
            .iter_mut()
            .find(|stored| &stored.id == id)
            .ok_or_else(|| AppError::NotFound(format!("override '{id}' does not exist")))?;
        stored.permission = record.permission;
        Ok(())
    }

    async fn delete_override(&self, id: &OverrideId) -> AppResult<()> {
        let resource_key = self
            .records
            .lock()
            .await
            .iter()
            .find(|stored| &stored.id == id)
            .map(|stored| stored.resource_key.clone())
            .ok_or_else(|| AppError::NotFound(format!("override '{id}' does not exist")))?;
        self.check_write("delete", &resource_key).await?;
        self.records.lock().await.retain(|stored| &stored.id != id);
        Ok(())
    }
}
