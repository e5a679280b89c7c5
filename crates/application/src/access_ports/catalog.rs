use async_trait::async_trait;

use shopfloor_core::AppResult;
use shopfloor_domain::PermissionDefinition;

/// Repository port for the permission catalog.
#[async_trait]
pub trait PermissionCatalogRepository: Send + Sync {
    /// Lists every catalog entry.
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>>;

    /// Finds one catalog entry by its `resource:action` identifier.
    async fn find_permission(&self, permission_id: &str)
    -> AppResult<Option<PermissionDefinition>>;

    /// Inserts a new catalog entry, failing with a conflict when it exists.
    async fn insert_permission(&self, permission: PermissionDefinition) -> AppResult<()>;
}
