mod decision;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use shopfloor_core::{AppError, AppResult, UserIdentity};
use shopfloor_domain::{
    AuditAction, AuditCategory, AuditOutcome, AuditSeverity, GrantAssignment, GrantTarget,
    PermissionAction, conditions_hold,
};

use crate::access_cache::AccessCache;
use crate::access_ports::AccessRepositories;
use crate::audit_ports::AuditEvent;
use crate::audit_sink::AuditSink;
use crate::role_graph::RoleGraph;

pub use decision::{AccessDecision, AccessRequest, DecisionSource, DenialKind};

/// Fail-closed permission resolution over grants, roles and conditions.
#[derive(Clone)]
pub struct PermissionEngine {
    repositories: AccessRepositories,
    cache: Arc<AccessCache>,
    audit: AuditSink,
    deadline: Option<Duration>,
}

impl PermissionEngine {
    /// Creates an engine reading through the shared resolution cache.
    #[must_use]
    pub fn new(repositories: AccessRepositories, cache: Arc<AccessCache>, audit: AuditSink) -> Self {
        Self {
            repositories,
            cache,
            audit,
            deadline: None,
        }
    }

    /// Applies `deadline` to every [`PermissionEngine::check`] call.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Decides a request. Direct grants win over role grants; anything
    /// unproven is denied and every denial is audited.
    pub async fn check(&self, request: &AccessRequest) -> AccessDecision {
        if let Some(deadline) = self.deadline {
            return self.check_with_deadline(request, deadline).await;
        }

        let decision = settle(request, self.evaluate(request).await);
        self.finish(request, decision)
    }

    /// Decides a request, denying when resolution outlives `deadline`.
    pub async fn check_with_deadline(
        &self,
        request: &AccessRequest,
        deadline: Duration,
    ) -> AccessDecision {
        let decision = match tokio::time::timeout(deadline, self.evaluate(request)).await {
            Ok(result) => settle(request, result),
            Err(_) => {
                tracing::warn!(
                    principal = request.principal.subject(),
                    resource = request.resource.as_str(),
                    action = request.action.as_str(),
                    deadline_ms = deadline.as_millis() as u64,
                    "access check timed out, denying"
                );
                AccessDecision::denied(DenialKind::TimedOut)
            }
        };

        self.finish(request, decision)
    }

    /// Ensures the actor holds `resource:action`.
    pub async fn require_permission(
        &self,
        actor: &UserIdentity,
        resource: &str,
        action: PermissionAction,
    ) -> AppResult<()> {
        let request = AccessRequest::for_identity(actor.clone(), resource, action);
        let decision = self.check(&request).await;
        if decision.granted {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "subject '{}' is missing permission '{}'",
            actor.subject(),
            request.permission_id()
        )))
    }

    /// Returns the current role graph snapshot, loading it on a cache miss.
    pub async fn role_graph(&self) -> AppResult<Arc<RoleGraph>> {
        if let Some(graph) = self.cache.role_graph().await {
            return Ok(graph);
        }

        let generation = self.cache.generation();
        let graph = Arc::new(RoleGraph::load(&self.repositories).await?);
        self.cache.store_role_graph(graph.clone(), generation).await;

        Ok(graph)
    }

    async fn grants_for(&self, principal: &str) -> AppResult<Arc<Vec<GrantAssignment>>> {
        if let Some(grants) = self.cache.grants_for(principal).await {
            return Ok(grants);
        }

        let generation = self.cache.generation();
        let grants = Arc::new(
            self.repositories
                .grants
                .list_grants_for_principal(principal)
                .await?,
        );
        self.cache
            .store_grants(principal, grants.clone(), generation)
            .await;

        Ok(grants)
    }

    async fn evaluate(&self, request: &AccessRequest) -> AppResult<AccessDecision> {
        let now = Utc::now();
        let grants = self.grants_for(request.principal.subject()).await?;
        let effective: Vec<&GrantAssignment> = grants
            .iter()
            .filter(|grant| grant.is_effective_at(now))
            .collect();

        if effective.is_empty() {
            return Ok(AccessDecision::denied(DenialKind::NoMatchingGrant));
        }

        let graph = self.role_graph().await?;
        let requested = request.permission_id();

        for grant in &effective {
            let GrantTarget::Permission { permission_id } = &grant.target else {
                continue;
            };
            if *permission_id != requested {
                continue;
            }

            let Some(permission) = graph.permission(permission_id) else {
                tracing::warn!(
                    grant_id = grant.grant_id.as_str(),
                    permission_id = permission_id.as_str(),
                    "skipping direct grant of unknown permission"
                );
                continue;
            };

            let conditions = grant
                .conditions
                .as_deref()
                .unwrap_or_else(|| permission.conditions());
            if conditions_hold(conditions, &request.context) {
                return Ok(AccessDecision::direct(grant, permission_id));
            }
        }

        let mut role_grants: Vec<(&GrantAssignment, &str)> = effective
            .iter()
            .filter_map(|grant| match &grant.target {
                GrantTarget::Role { role_id } => Some((*grant, role_id.as_str())),
                GrantTarget::Permission { .. } => None,
            })
            .collect();
        role_grants.sort_by(|(left, _), (right, _)| {
            left.granted_at
                .cmp(&right.granted_at)
                .then_with(|| left.grant_id.cmp(&right.grant_id))
        });

        for (grant, role_id) in role_grants {
            let matched = graph.resolve(role_id).into_iter().find(|resolved| {
                resolved
                    .permission
                    .matches(request.resource.as_str(), request.action)
                    && conditions_hold(resolved.permission.conditions(), &request.context)
            });

            if let Some(resolved) = matched {
                return Ok(AccessDecision::via_role(grant, role_id, &resolved));
            }
        }

        Ok(AccessDecision::denied(DenialKind::NoMatchingGrant))
    }

    fn finish(&self, request: &AccessRequest, decision: AccessDecision) -> AccessDecision {
        if decision.granted {
            tracing::debug!(
                principal = request.principal.subject(),
                resource = request.resource.as_str(),
                action = request.action.as_str(),
                source = decision.source.as_str(),
                "access granted"
            );
            return decision;
        }

        let denial = decision.denial.unwrap_or(DenialKind::NoMatchingGrant);
        tracing::info!(
            principal = request.principal.subject(),
            requested_by = request.requested_by.as_deref(),
            resource = request.resource.as_str(),
            action = request.action.as_str(),
            denial = denial.as_str(),
            "access denied"
        );

        let mut event = AuditEvent::new(
            &request.principal,
            AuditAction::AccessDenied,
            AuditCategory::Security,
            AuditSeverity::Medium,
            request.resource.clone(),
            format!(
                "denied '{}' on '{}': {}",
                request.action.as_str(),
                request.resource,
                decision.reason
            ),
        )
        .with_resource_id(request.permission_id())
        .with_outcome(AuditOutcome::Failure);
        if let Some(requested_by) = request.requested_by.as_deref() {
            event = event.with_changes(None, Some(json!({ "requested_by": requested_by })));
        }
        self.audit.emit(event);

        decision
    }
}

fn settle(request: &AccessRequest, result: AppResult<AccessDecision>) -> AccessDecision {
    result.unwrap_or_else(|error| {
        tracing::error!(
            principal = request.principal.subject(),
            resource = request.resource.as_str(),
            action = request.action.as_str(),
            error = %error,
            "access check could not be determined, denying"
        );
        AccessDecision::denied(DenialKind::Indeterminate)
    })
}
