use super::*;

use shopfloor_domain::{
    AuditAction, AuditCategory, AuditOutcome, AuditSeverity, RoleDefinition, RoleDefinitionInput,
};

use crate::audit_ports::AuditEvent;
use crate::role_graph::ResolvedPermission;

impl CatalogService {
    /// Returns every role, active or not.
    pub async fn list_roles(&self, actor: &UserIdentity) -> AppResult<Vec<RoleDefinition>> {
        self.require_security_manage(actor).await?;

        let mut roles = self.repositories.roles.list_roles().await?;
        roles.sort_by(|left, right| left.role_id().cmp(right.role_id()));
        Ok(roles)
    }

    /// Returns the effective permissions of a role, inheritance included.
    pub async fn role_permissions(
        &self,
        actor: &UserIdentity,
        role_id: &str,
    ) -> AppResult<Vec<ResolvedPermission>> {
        self.require_security_manage(actor).await?;

        let graph = self.engine.role_graph().await?;
        if graph.role(role_id).is_none() {
            return Err(AppError::NotFound(format!("role '{role_id}' does not exist")));
        }

        Ok(graph.resolve(role_id))
    }

    /// Creates a role after validating its references and emits an audit event.
    pub async fn create_role(
        &self,
        actor: &UserIdentity,
        input: RoleDefinitionInput,
    ) -> AppResult<RoleDefinition> {
        self.require_security_manage(actor).await?;

        let role = RoleDefinition::new(input, Utc::now())?;
        RoleGraph::load(&self.repositories).await?.validate(&role)?;
        let after = snapshot(&role)?;

        self.repositories.roles.insert_role(role.clone()).await?;
        self.cache.invalidate_definitions().await;

        tracing::info!(
            actor = actor.subject(),
            role_id = role.role_id(),
            "role created"
        );

        self.audit.emit(
            AuditEvent::new(
                actor,
                AuditAction::RoleCreated,
                AuditCategory::Security,
                AuditSeverity::High,
                "role",
                format!("created role '{}'", role.role_id()),
            )
            .with_resource_id(role.role_id())
            .with_changes(None, Some(after)),
        );

        Ok(role)
    }

    /// Replaces a role's attributes when `expected_version` is still current.
    pub async fn update_role(
        &self,
        actor: &UserIdentity,
        input: RoleDefinitionInput,
        expected_version: u64,
    ) -> AppResult<RoleDefinition> {
        self.require_security_manage(actor).await?;

        let current = self.find_role(input.role_id.as_str()).await?;
        if current.version() != expected_version {
            return Err(AppError::Conflict(format!(
                "role '{}' is at version {}, not {expected_version}",
                current.role_id(),
                current.version()
            )));
        }

        let revised = current.revised(input, Utc::now())?;
        RoleGraph::load(&self.repositories)
            .await?
            .validate(&revised)?;
        let before = snapshot(&current)?;
        let after = snapshot(&revised)?;

        self.repositories
            .roles
            .update_role(revised.clone(), expected_version)
            .await?;
        self.cache.invalidate_definitions().await;

        tracing::info!(
            actor = actor.subject(),
            role_id = revised.role_id(),
            version = revised.version(),
            "role updated"
        );

        self.audit.emit(
            AuditEvent::new(
                actor,
                AuditAction::RoleUpdated,
                AuditCategory::Security,
                AuditSeverity::High,
                "role",
                format!("updated role '{}'", revised.role_id()),
            )
            .with_resource_id(revised.role_id())
            .with_changes(Some(before), Some(after)),
        );

        Ok(revised)
    }

    /// Deactivates a role.
    ///
    /// The critical audit record is committed before the role changes; when
    /// it cannot be persisted the role stays active and the call fails.
    pub async fn deactivate_role(
        &self,
        actor: &UserIdentity,
        role_id: &str,
    ) -> AppResult<RoleDefinition> {
        self.require_security_manage(actor).await?;

        let current = self.find_role(role_id).await?;
        if current.is_system() {
            return Err(AppError::Conflict(format!(
                "system role '{role_id}' cannot be deactivated"
            )));
        }
        if !current.is_active() {
            return Ok(current);
        }

        let deactivated = current.deactivated(Utc::now());
        let before = snapshot(&current)?;
        let event = AuditEvent::new(
            actor,
            AuditAction::RoleDeactivated,
            AuditCategory::Security,
            AuditSeverity::Critical,
            "role",
            format!("deactivated role '{role_id}'"),
        )
        .with_resource_id(role_id);

        self.audit
            .emit_committed(
                event
                    .clone()
                    .with_changes(Some(before.clone()), Some(snapshot(&deactivated)?)),
            )
            .await?;

        if let Err(error) = self
            .repositories
            .roles
            .update_role(deactivated.clone(), current.version())
            .await
        {
            let mut failed = event
                .with_outcome(AuditOutcome::Failure)
                .with_changes(Some(before), None);
            failed.description = format!("failed to deactivate role '{role_id}': {error}");
            self.audit.emit(failed);
            return Err(error);
        }
        self.cache.invalidate_definitions().await;

        tracing::warn!(actor = actor.subject(), role_id, "role deactivated");

        Ok(deactivated)
    }

    async fn find_role(&self, role_id: &str) -> AppResult<RoleDefinition> {
        self.repositories
            .roles
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))
    }
}
