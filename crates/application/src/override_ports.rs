use async_trait::async_trait;

use rollcall_core::AppResult;
use rollcall_domain::{NewOverrideRecord, OverrideId, OverrideRecord, OverrideTarget};

/// Store port for role- and user-level permission overrides.
///
/// Every method is a round-trip to the backend; callers never keep a local copy
/// around to decide between create, update and delete.
#[async_trait]
pub trait OverrideStore: Send + Sync {
    /// Lists every override recorded for one role or one user.
    async fn list_overrides(&self, target: &OverrideTarget) -> AppResult<Vec<OverrideRecord>>;

    /// Persists a new override and returns it with its assigned identifier.
    async fn create_override(&self, record: NewOverrideRecord) -> AppResult<OverrideRecord>;

    /// Replaces the permission of an existing override.
    async fn update_override(&self, id: &OverrideId, record: NewOverrideRecord) -> AppResult<()>;

    /// Removes an override so the target inherits again.
    async fn delete_override(&self, id: &OverrideId) -> AppResult<()>;
}
