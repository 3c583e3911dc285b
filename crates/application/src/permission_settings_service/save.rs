use std::collections::BTreeMap;

use futures::future::join_all;
use rollcall_core::{AppError, AppResult};
use rollcall_domain::ResourceKey;

use super::PermissionSettingsService;
use crate::{PlannedOperation, plan_save};

/// Key whose store write was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFailure {
    /// Key that stays pending.
    pub resource_key: ResourceKey,
    /// Store error reported for the key.
    pub message: String,
}

/// Outcome of one save.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveReport {
    /// Keys now persisted as selected.
    pub succeeded: Vec<ResourceKey>,
    /// Keys whose writes failed.
    pub failed: Vec<SaveFailure>,
    /// Number of store writes issued.
    pub operations: usize,
    /// Whether the operator switched targets before the save settled.
    pub stale: bool,
}

impl SaveReport {
    /// Returns whether every pending key was persisted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.stale && self.failed.is_empty()
    }
}

impl PermissionSettingsService {
    /// Persists pending selections of the inspected target.
    ///
    /// Overrides are fetched again before planning so the diff never runs
    /// against a cached snapshot. Writes run concurrently and fail per key:
    /// failed keys stay pending, succeeded keys are cleared once the layers
    /// have been reloaded.
    pub async fn save(&self) -> AppResult<SaveReport> {
        let (generation, actor, desired) = {
            let state = self.state.lock().await;
            let actor = state.inspected.clone().ok_or_else(|| {
                AppError::Validation("select a role or user before saving permissions".to_owned())
            })?;
            (state.generation, actor, state.pending.clone())
        };

        if desired.is_empty() {
            return Ok(SaveReport::default());
        }

        let layers = match self.fetch_layers(&actor).await {
            Ok(layers) => layers,
            Err(error) => {
                let mut state = self.state.lock().await;
                if state.generation == generation {
                    state.load_error = Some(error.to_string());
                }
                return Err(error);
            }
        };

        if !self.is_current(generation).await {
            tracing::debug!(actor = %actor, "skipping save for a previous selection");
            return Ok(SaveReport {
                stale: true,
                ..SaveReport::default()
            });
        }

        let target = actor.override_target();
        let permissions = layers.permissions(&actor, self.table.clone());
        let plan = plan_save(&target, &desired, &layers.target_records, |key| {
            permissions.resolve_inherited(key).permission
        });

        tracing::info!(
            override_target = %target,
            pending = desired.len(),
            operations = plan.len(),
            "saving permission overrides"
        );

        let operations = plan.into_operations();
        let outcomes = join_all(operations.iter().map(|operation| self.execute(operation))).await;

        let mut errors: BTreeMap<ResourceKey, Vec<String>> = BTreeMap::new();
        let mut written = 0_usize;
        for (operation, outcome) in operations.iter().zip(outcomes) {
            match outcome {
                Ok(()) => written += 1,
                Err(error) => {
                    tracing::warn!(
                        override_target = %target,
                        resource_key = %operation.resource_key(),
                        operation = operation.kind(),
                        error = %error,
                        "permission override write failed"
                    );
                    errors
                        .entry(operation.resource_key().clone())
                        .or_default()
                        .push(error.to_string());
                }
            }
        }

        let mut report = SaveReport {
            operations: operations.len(),
            ..SaveReport::default()
        };
        for resource_key in desired.keys() {
            match errors.remove(resource_key) {
                Some(messages) => report.failed.push(SaveFailure {
                    resource_key: resource_key.clone(),
                    message: messages.join("; "),
                }),
                None => report.succeeded.push(resource_key.clone()),
            }
        }

        let reloaded = self.fetch_layers(&actor).await;
        {
            let mut state = self.state.lock().await;
            if state.generation == generation {
                match reloaded {
                    Ok(layers) => {
                        state.layers = Some(layers);
                        state.load_error = None;
                    }
                    Err(error) => state.load_error = Some(error.to_string()),
                }
                for resource_key in &report.succeeded {
                    if state.pending.get(resource_key) == desired.get(resource_key) {
                        state.pending.remove(resource_key);
                    }
                }
            } else {
                tracing::debug!(actor = %actor, "selection changed while saving");
                report.stale = true;
            }
        }

        if written > 0 {
            self.invalidation.notify(target);
        }

        Ok(report)
    }

    async fn is_current(&self, generation: u64) -> bool {
        self.state.lock().await.generation == generation
    }

    async fn execute(&self, operation: &PlannedOperation) -> AppResult<()> {
        match operation {
            PlannedOperation::Create(record) => self
                .store
                .create_override(record.clone())
                .await
                .map(|_| ()),
            PlannedOperation::Update { id, record } => {
                self.store.update_override(id, record.clone()).await
            }
            PlannedOperation::Delete { id, .. } => self.store.delete_override(id).await,
        }
    }
}
