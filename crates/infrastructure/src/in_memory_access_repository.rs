use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use shopfloor_application::{GrantRepository, PermissionCatalogRepository, RoleRepository};
use shopfloor_core::{AppError, AppResult};
use shopfloor_domain::{GrantAssignment, PermissionDefinition, RoleDefinition};

/// In-memory access-control repository for single-process deployments and tests.
#[derive(Debug, Default)]
pub struct InMemoryAccessRepository {
    permissions: RwLock<BTreeMap<String, PermissionDefinition>>,
    roles: RwLock<BTreeMap<String, RoleDefinition>>,
    grants: RwLock<BTreeMap<String, GrantAssignment>>,
}

impl InMemoryAccessRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionCatalogRepository for InMemoryAccessRepository {
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        Ok(self.permissions.read().await.values().cloned().collect())
    }

    async fn find_permission(
        &self,
        permission_id: &str,
    ) -> AppResult<Option<PermissionDefinition>> {
        Ok(self.permissions.read().await.get(permission_id).cloned())
    }

    async fn insert_permission(&self, permission: PermissionDefinition) -> AppResult<()> {
        let permission_id = permission.permission_id();
        let mut permissions = self.permissions.write().await;
        if permissions.contains_key(permission_id.as_str()) {
            return Err(AppError::Conflict(format!(
                "permission '{permission_id}' already exists"
            )));
        }

        permissions.insert(permission_id, permission);
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for InMemoryAccessRepository {
    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>> {
        Ok(self.roles.read().await.values().cloned().collect())
    }

    async fn find_role(&self, role_id: &str) -> AppResult<Option<RoleDefinition>> {
        Ok(self.roles.read().await.get(role_id).cloned())
    }

    async fn insert_role(&self, role: RoleDefinition) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        if roles.contains_key(role.role_id()) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.role_id()
            )));
        }

        roles.insert(role.role_id().to_owned(), role);
        Ok(())
    }

    async fn update_role(&self, role: RoleDefinition, expected_version: u64) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        let stored = roles
            .get_mut(role.role_id())
            .ok_or_else(|| AppError::NotFound(format!("role '{}' does not exist", role.role_id())))?;

        if stored.version() != expected_version {
            return Err(AppError::Conflict(format!(
                "role '{}' is at version {}, expected {expected_version}",
                role.role_id(),
                stored.version()
            )));
        }

        *stored = role;
        Ok(())
    }
}

#[async_trait]
impl GrantRepository for InMemoryAccessRepository {
    async fn list_grants_for_principal(
        &self,
        principal: &str,
    ) -> AppResult<Vec<GrantAssignment>> {
        Ok(self
            .grants
            .read()
            .await
            .values()
            .filter(|grant| grant.principal == principal)
            .cloned()
            .collect())
    }

    async fn insert_grant(&self, grant: GrantAssignment) -> AppResult<()> {
        let mut grants = self.grants.write().await;
        if grants.contains_key(grant.grant_id.as_str()) {
            return Err(AppError::Conflict(format!(
                "grant '{}' already exists",
                grant.grant_id
            )));
        }
        if grant.is_active
            && grants.values().any(|stored| {
                stored.is_active
                    && stored.principal == grant.principal
                    && stored.target == grant.target
            })
        {
            return Err(AppError::Conflict(format!(
                "principal '{}' already holds an active grant of '{}'",
                grant.principal,
                grant.target.target_id()
            )));
        }

        grants.insert(grant.grant_id.clone(), grant);
        Ok(())
    }

    async fn deactivate_grant(
        &self,
        grant_id: &str,
        revoked_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut grants = self.grants.write().await;
        let Some(grant) = grants.get_mut(grant_id) else {
            return Ok(false);
        };
        if !grant.is_active {
            return Ok(false);
        }

        grant.is_active = false;
        grant.revoked_by = revoked_by.map(str::to_owned);
        grant.revoked_at = Some(at);
        Ok(true)
    }

    async fn list_expired_active_grants(
        &self,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<GrantAssignment>> {
        Ok(self
            .grants
            .read()
            .await
            .values()
            .filter(|grant| grant.is_active && grant.is_expired_at(now))
            .cloned()
            .collect())
    }
}
