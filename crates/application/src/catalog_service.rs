mod permissions;
mod roles;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::Utc;

use shopfloor_core::{AppError, AppResult, UserIdentity};
use shopfloor_domain::{PermissionAction, SECURITY_RESOURCE};

use crate::access_cache::AccessCache;
use crate::access_ports::AccessRepositories;
use crate::audit_sink::AuditSink;
use crate::permission_engine::PermissionEngine;
use crate::role_graph::{RoleGraph, RoleIntegrityIssue};

/// Application service administering the permission catalog and roles.
#[derive(Clone)]
pub struct CatalogService {
    repositories: AccessRepositories,
    cache: Arc<AccessCache>,
    engine: PermissionEngine,
    audit: AuditSink,
}

impl CatalogService {
    /// Creates a catalog service sharing the engine's resolution cache.
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

    /// Lists dangling references and inheritance cycles in stored definitions.
    pub async fn integrity_report(
        &self,
        actor: &UserIdentity,
    ) -> AppResult<Vec<RoleIntegrityIssue>> {
        self.require_security_manage(actor).await?;

        let issues = RoleGraph::load(&self.repositories).await?.integrity_issues();
        for issue in &issues {
            tracing::warn!(issue = issue.describe(), "catalog integrity issue");
        }

        Ok(issues)
    }

    async fn require_security_manage(&self, actor: &UserIdentity) -> AppResult<()> {
        self.engine
            .require_permission(actor, SECURITY_RESOURCE, PermissionAction::Manage)
            .await
    }
}

fn snapshot<T: serde::Serialize>(value: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|error| {
        AppError::Internal(format!("failed to serialize audit snapshot: {error}"))
    })
}
