use std::collections::HashMap;

use async_trait::async_trait;
use rollcall_application::OverrideStore;
use rollcall_core::{AppError, AppResult};
use rollcall_domain::{NewOverrideRecord, OverrideId, OverrideRecord, OverrideTarget};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory override store implementation.
#[derive(Debug, Default)]
pub struct InMemoryOverrideStore {
    records: RwLock<HashMap<OverrideId, OverrideRecord>>,
}

impl InMemoryOverrideStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a store preloaded with `records`, keeping legacy duplicates.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = OverrideRecord>) -> Self {
        Self {
            records: RwLock::new(
                records
                    .into_iter()
                    .map(|record| (record.id.clone(), record))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl OverrideStore for InMemoryOverrideStore {
    async fn list_overrides(&self, target: &OverrideTarget) -> AppResult<Vec<OverrideRecord>> {
        let records = self.records.read().await;

        let mut values: Vec<OverrideRecord> = records
            .values()
            .filter(|record| &record.target == target)
            .cloned()
            .collect();
        values.sort_by(|left, right| {
            left.resource_key
                .cmp(&right.resource_key)
                .then_with(|| left.id.cmp(&right.id))
        });

        Ok(values)
    }

    async fn create_override(&self, record: NewOverrideRecord) -> AppResult<OverrideRecord> {
        let mut records = self.records.write().await;

        if records
            .values()
            .any(|stored| stored.same_slot(&record.target, &record.resource_key))
        {
            return Err(AppError::Conflict(format!(
                "override for '{}' on '{}' already exists",
                record.target, record.resource_key
            )));
        }

        let id = OverrideId::new(Uuid::new_v4().to_string())?;
        let record = record.with_id(id.clone());
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn update_override(&self, id: &OverrideId, record: NewOverrideRecord) -> AppResult<()> {
        let mut records = self.records.write().await;

        // Legacy duplicates of an unchanged slot are tolerated; moving onto a taken slot is not.
        let moves_slot = records
            .get(id)
            .is_some_and(|stored| !stored.same_slot(&record.target, &record.resource_key));
        if moves_slot
            && records.values().any(|stored| {
                &stored.id != id && stored.same_slot(&record.target, &record.resource_key)
            })
        {
            return Err(AppError::Conflict(format!(
                "override for '{}' on '{}' already exists",
                record.target, record.resource_key
            )));
        }

        let stored = records
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("override '{id}' does not exist")))?;
        *stored = record.with_id(id.clone());
        Ok(())
    }

    async fn delete_override(&self, id: &OverrideId) -> AppResult<()> {
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("override '{id}' does not exist")))
    }
}
