use super::*;

use shopfloor_core::AppError;
use shopfloor_domain::{AuditAction, AuditCategory, AuditSeverity, GrantTarget};
use uuid::Uuid;

use crate::access_ports::AssignGrantInput;
use crate::audit_ports::AuditEvent;

impl GrantService {
    /// Assigns an active role to a principal and emits an audit event.
    pub async fn assign_role(
        &self,
        actor: &UserIdentity,
        input: AssignGrantInput,
    ) -> AppResult<GrantAssignment> {
        self.require_security_manage(actor).await?;

        if input.conditions.is_some() {
            return Err(AppError::Validation(
                "conditions can only be attached to direct permission grants".to_owned(),
            ));
        }

        let role = self
            .repositories
            .roles
            .find_role(input.target_id.as_str())
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("role '{}' does not exist", input.target_id))
            })?;
        if !role.is_active() {
            return Err(AppError::Validation(format!(
                "role '{}' is inactive and cannot be assigned",
                role.role_id()
            )));
        }

        let target = GrantTarget::Role {
            role_id: role.role_id().to_owned(),
        };
        self.record_grant(actor, input, target, AuditAction::RoleAssigned)
            .await
    }

    /// Grants one catalog permission directly and emits an audit event.
    pub async fn assign_permission(
        &self,
        actor: &UserIdentity,
        input: AssignGrantInput,
    ) -> AppResult<GrantAssignment> {
        self.require_security_manage(actor).await?;

        let permission = self
            .repositories
            .catalog
            .find_permission(input.target_id.as_str())
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("permission '{}' does not exist", input.target_id))
            })?;

        let target = GrantTarget::Permission {
            permission_id: permission.permission_id(),
        };
        self.record_grant(actor, input, target, AuditAction::PermissionGranted)
            .await
    }

    /// Stores a grant without an authorization check.
    ///
    /// Callers are the guarded methods above and the deployment bootstrap.
    pub(crate) async fn record_grant(
        &self,
        actor: &UserIdentity,
        input: AssignGrantInput,
        target: GrantTarget,
        action: AuditAction,
    ) -> AppResult<GrantAssignment> {
        let principal = input.principal.trim();
        if principal.is_empty() {
            return Err(AppError::Validation(
                "grant principal must not be empty".to_owned(),
            ));
        }

        let now = Utc::now();
        if let Some(expires_at) = input.expires_at
            && expires_at <= now
        {
            return Err(AppError::Validation(
                "grant expiry must be in the future".to_owned(),
            ));
        }

        let lapsed: Vec<GrantAssignment> = self
            .repositories
            .grants
            .list_grants_for_principal(principal)
            .await?
            .into_iter()
            .filter(|grant| grant.target == target && grant.is_expired_at(now))
            .collect();
        if !lapsed.is_empty() {
            self.retire_expired(lapsed, now).await?;
        }

        let before = self.effective_grants(principal, now).await?;
        if before.iter().any(|grant| grant.target == target) {
            return Err(AppError::Conflict(format!(
                "principal '{principal}' already holds {} '{}'",
                target.kind(),
                target.target_id()
            )));
        }

        let grant = GrantAssignment {
            grant_id: Uuid::new_v4().to_string(),
            principal: principal.to_owned(),
            target,
            granted_by: actor.subject().to_owned(),
            granted_at: now,
            expires_at: input.expires_at,
            conditions: input.conditions,
            is_active: true,
            reason: input
                .reason
                .map(|reason| reason.trim().to_owned())
                .filter(|reason| !reason.is_empty()),
            revoked_by: None,
            revoked_at: None,
        };

        self.repositories.grants.insert_grant(grant.clone()).await?;
        self.cache.invalidate_principal(principal).await;

        tracing::info!(
            actor = actor.subject(),
            principal,
            grant_id = grant.grant_id.as_str(),
            target = grant.target.target_id(),
            "grant assigned"
        );

        let mut after = before.clone();
        after.push(grant.clone());
        self.audit.emit(
            AuditEvent::new(
                actor,
                action,
                AuditCategory::Security,
                AuditSeverity::Medium,
                "grant",
                format!(
                    "granted {} '{}' to '{principal}'",
                    grant.target.kind(),
                    grant.target.target_id()
                ),
            )
            .with_resource_id(grant.grant_id.clone())
            .with_changes(
                Some(grant_snapshot(principal, &before)),
                Some(grant_snapshot(principal, &after)),
            ),
        );

        Ok(grant)
    }
}
