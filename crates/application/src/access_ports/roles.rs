use async_trait::async_trait;

use shopfloor_core::AppResult;
use shopfloor_domain::RoleDefinition;

/// Repository port for role definitions.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Lists every role, active or not.
    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>>;

    /// Finds one role by identifier.
    async fn find_role(&self, role_id: &str) -> AppResult<Option<RoleDefinition>>;

    /// Inserts a new role, failing with a conflict when it exists.
    async fn insert_role(&self, role: RoleDefinition) -> AppResult<()>;

    /// Replaces a role when the stored version equals `expected_version`.
    ///
    /// Fails with a conflict on version mismatch and with not found when the
    /// role does not exist.
    async fn update_role(&self, role: RoleDefinition, expected_version: u64) -> AppResult<()>;
}
