mod assign;
mod revoke;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use shopfloor_core::{AppResult, UserIdentity};
use shopfloor_domain::{GrantAssignment, PermissionAction, SECURITY_RESOURCE};

use crate::access_cache::AccessCache;
use crate::access_ports::AccessRepositories;
use crate::audit_sink::AuditSink;
use crate::permission_engine::PermissionEngine;

/// Application service for the grant lifecycle of principals.
#[derive(Clone)]
pub struct GrantService {
    repositories: AccessRepositories,
    cache: Arc<AccessCache>,
    engine: PermissionEngine,
    audit: AuditSink,
}

impl GrantService {
    /// Creates a grant service sharing the engine's resolution cache.
    #[must_use]
    pub fn new(
        repositories: AccessRepositories,
        cache: Arc<AccessCache>,
        engine: PermissionEngine,
        audit: AuditSink,
    ) -> Self {
        Self {
            repositories,
            cache,
            engine,
            audit,
        }
    }

    /// Returns active, unexpired grants of a principal.
    ///
    /// Principals may list their own grants; everyone else needs
    /// `security:manage`.
    pub async fn active_grants_for(
        &self,
        actor: &UserIdentity,
        principal: &str,
    ) -> AppResult<Vec<GrantAssignment>> {
        if actor.subject() != principal {
            self.require_security_manage(actor).await?;
        }

        self.effective_grants(principal, Utc::now()).await
    }

    async fn effective_grants(
        &self,
        principal: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<GrantAssignment>> {
        let mut grants: Vec<GrantAssignment> = self
            .repositories
            .grants
            .list_grants_for_principal(principal)
            .await?
            .into_iter()
            .filter(|grant| grant.is_effective_at(now))
            .collect();
        grants.sort_by(|left, right| {
            left.granted_at
                .cmp(&right.granted_at)
                .then_with(|| left.grant_id.cmp(&right.grant_id))
        });

        Ok(grants)
    }

    async fn require_security_manage(&self, actor: &UserIdentity) -> AppResult<()> {
        self.engine
            .require_permission(actor, SECURITY_RESOURCE, PermissionAction::Manage)
            .await
    }
}

/// Audit snapshot of what a principal holds.
fn grant_snapshot(principal: &str, grants: &[GrantAssignment]) -> Value {
    let targets: Vec<String> = grants
        .iter()
        .map(|grant| format!("{}:{}", grant.target.kind(), grant.target.target_id()))
        .collect();

    json!({
        "principal": principal,
        "active_grants": targets,
    })
}
