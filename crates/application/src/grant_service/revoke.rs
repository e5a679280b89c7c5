use super::*;

use std::collections::BTreeSet;

use shopfloor_core::AppError;
use shopfloor_domain::{AuditAction, AuditCategory, AuditOutcome, AuditSeverity, GrantTarget};

use crate::audit_ports::AuditEvent;

impl GrantService {
    /// Revokes every active grant of `target_id` held by a principal.
    ///
    /// The resolution cache is invalidated before returning, so a following
    /// check no longer sees the revoked grants.
    pub async fn revoke(
        &self,
        actor: &UserIdentity,
        principal: &str,
        target_id: &str,
    ) -> AppResult<Vec<GrantAssignment>> {
        self.require_security_manage(actor).await?;

        let now = Utc::now();
        let stored = self
            .repositories
            .grants
            .list_grants_for_principal(principal)
            .await?;
        let matching: Vec<GrantAssignment> = stored
            .into_iter()
            .filter(|grant| grant.is_active && grant.target.target_id() == target_id)
            .collect();
        let Some(first) = matching.first() else {
            return Err(AppError::NotFound(format!(
                "principal '{principal}' has no active grant of '{target_id}'"
            )));
        };
        let action = match first.target {
            GrantTarget::Role { .. } => AuditAction::RoleRevoked,
            GrantTarget::Permission { .. } => AuditAction::PermissionRevoked,
        };

        let before = self.effective_grants(principal, now).await?;
        let (revoked, mut failure) = self.deactivate_all(&matching, actor.subject(), now).await;
        self.cache.invalidate_principal(principal).await;
        if revoked.is_empty()
            && let Some(error) = failure.take()
        {
            return Err(error);
        }

        let revoked_ids: BTreeSet<&str> = revoked
            .iter()
            .map(|grant| grant.grant_id.as_str())
            .collect();
        let after: Vec<GrantAssignment> = before
            .iter()
            .filter(|grant| !revoked_ids.contains(grant.grant_id.as_str()))
            .cloned()
            .collect();

        let outcome = if failure.is_some() {
            tracing::warn!(
                actor = actor.subject(),
                principal,
                target = target_id,
                revoked = revoked.len(),
                pending = matching.len() - revoked.len(),
                "grant revoked partially"
            );
            AuditOutcome::Partial
        } else {
            tracing::info!(
                actor = actor.subject(),
                principal,
                target = target_id,
                revoked = revoked.len(),
                "grant revoked"
            );
            AuditOutcome::Success
        };

        self.audit.emit(
            AuditEvent::new(
                actor,
                action,
                AuditCategory::Security,
                AuditSeverity::Medium,
                "grant",
                format!("revoked '{target_id}' from '{principal}'"),
            )
            .with_resource_id(format!("{principal}:{target_id}"))
            .with_outcome(outcome)
            .with_changes(
                Some(grant_snapshot(principal, &before)),
                Some(grant_snapshot(principal, &after)),
            ),
        );

        if let Some(error) = failure {
            return Err(error);
        }

        Ok(revoked)
    }

    /// Deactivates grants whose expiry passed, returning how many this call
    /// deactivated.
    ///
    /// Safe to run concurrently: a grant already deactivated elsewhere is
    /// skipped.
    pub async fn sweep_expired_grants(&self) -> AppResult<usize> {
        let now = Utc::now();
        let expired = self
            .repositories
            .grants
            .list_expired_active_grants(now)
            .await?;

        self.retire_expired(expired, now).await
    }

    /// Deactivates grants already past their expiry and records one
    /// `grants_expired` entry for those this call deactivated.
    pub(super) async fn retire_expired(
        &self,
        expired: Vec<GrantAssignment>,
        now: DateTime<Utc>,
    ) -> AppResult<usize> {
        let mut swept = Vec::new();
        let mut failure = None;
        for grant in expired {
            match self
                .repositories
                .grants
                .deactivate_grant(grant.grant_id.as_str(), None, now)
                .await
            {
                Ok(true) => swept.push(grant),
                Ok(false) => {}
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }

        let principals: BTreeSet<&str> = swept
            .iter()
            .map(|grant| grant.principal.as_str())
            .collect();
        for principal in principals {
            self.cache.invalidate_principal(principal).await;
        }

        if !swept.is_empty() {
            tracing::info!(count = swept.len(), "deactivated expired grants");
            let outcome = if failure.is_some() {
                AuditOutcome::Partial
            } else {
                AuditOutcome::Success
            };
            let grant_ids: Vec<&str> = swept.iter().map(|grant| grant.grant_id.as_str()).collect();
            self.audit.emit(
                AuditEvent::new(
                    &UserIdentity::system(),
                    AuditAction::GrantsExpired,
                    AuditCategory::System,
                    AuditSeverity::Low,
                    "grant",
                    format!("deactivated {} expired grants", swept.len()),
                )
                .with_outcome(outcome)
                .with_changes(None, Some(json!({ "grant_ids": grant_ids }))),
            );
        }

        if let Some(error) = failure {
            return Err(error);
        }

        Ok(swept.len())
    }

    async fn deactivate_all(
        &self,
        grants: &[GrantAssignment],
        revoked_by: &str,
        now: DateTime<Utc>,
    ) -> (Vec<GrantAssignment>, Option<AppError>) {
        let mut revoked = Vec::with_capacity(grants.len());
        for grant in grants {
            match self
                .repositories
                .grants
                .deactivate_grant(grant.grant_id.as_str(), Some(revoked_by), now)
                .await
            {
                Ok(true) => revoked.push(grant.revoked(revoked_by, now)),
                Ok(false) => {}
                Err(error) => return (revoked, Some(error)),
            }
        }

        (revoked, None)
    }
}
