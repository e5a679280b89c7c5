use super::*;

use shopfloor_domain::{
    AuditAction, AuditCategory, AuditSeverity, PermissionDefinition, PermissionDefinitionInput,
};

use crate::audit_ports::AuditEvent;

impl CatalogService {
    /// Returns every catalog entry.
    pub async fn list_permissions(
        &self,
        actor: &UserIdentity,
    ) -> AppResult<Vec<PermissionDefinition>> {
        self.require_security_manage(actor).await?;

        let mut permissions = self.repositories.catalog.list_permissions().await?;
        permissions.sort_by_key(PermissionDefinition::permission_id);
        Ok(permissions)
    }

    /// Adds a permission to the catalog and emits an audit event.
    pub async fn create_permission(
        &self,
        actor: &UserIdentity,
        input: PermissionDefinitionInput,
    ) -> AppResult<PermissionDefinition> {
        self.require_security_manage(actor).await?;

        let permission = PermissionDefinition::new(input)?;
        let after = snapshot(&permission)?;
        self.repositories
            .catalog
            .insert_permission(permission.clone())
            .await?;
        self.cache.invalidate_definitions().await;

        let permission_id = permission.permission_id();
        tracing::info!(
            actor = actor.subject(),
            permission_id = permission_id.as_str(),
            "permission created"
        );

        self.audit.emit(
            AuditEvent::new(
                actor,
                AuditAction::PermissionCreated,
                AuditCategory::Security,
                AuditSeverity::High,
                "permission",
                format!("created permission '{permission_id}'"),
            )
            .with_resource_id(permission_id.clone())
            .with_changes(None, Some(after)),
        );

        Ok(permission)
    }
}
