mod catalog;
mod grants;
mod roles;

use std::sync::Arc;

pub use catalog::PermissionCatalogRepository;
pub use grants::{AssignGrantInput, GrantRepository};
pub use roles::RoleRepository;

/// Persistence ports backing the access-control services.
///
/// One adapter usually implements all three; they stay separate so tests
/// and alternative stores can mix implementations.
#[derive(Clone)]
pub struct AccessRepositories {
    /// Permission catalog.
    pub catalog: Arc<dyn PermissionCatalogRepository>,
    /// Role definitions.
    pub roles: Arc<dyn RoleRepository>,
    /// Grant assignments.
    pub grants: Arc<dyn GrantRepository>,
}

impl AccessRepositories {
    /// Uses one adapter for every port.
    #[must_use]
    pub fn from_shared<T>(repository: Arc<T>) -> Self
    where
        T: PermissionCatalogRepository + RoleRepository + GrantRepository + 'static,
    {
        Self {
            catalog: repository.clone(),
            roles: repository.clone(),
            grants: repository,
        }
    }
}
