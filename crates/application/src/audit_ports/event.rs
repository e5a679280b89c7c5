use chrono::{DateTime, SubsecRound, Utc};
use serde_json::Value;

use shopfloor_core::UserIdentity;
use shopfloor_domain::{
    AuditAction, AuditActor, AuditCategory, AuditChanges, AuditOutcome, AuditSeverity,
};

/// Audit event payload emitted by application services before it is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    /// Actor that performed the action.
    pub actor: AuditActor,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource label.
    pub resource: String,
    /// Resource identifier.
    pub resource_id: Option<String>,
    /// Event grouping.
    pub category: AuditCategory,
    /// Event severity.
    pub severity: AuditSeverity,
    /// Action result.
    pub outcome: AuditOutcome,
    /// Event timestamp.
    pub occurred_at: DateTime<Utc>,
    /// Free-text description.
    pub description: String,
    /// Optional change snapshot.
    pub changes: Option<AuditChanges>,
    /// Network origin of the request.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Session identifier.
    pub session_id: Option<String>,
    /// Correlation identifier.
    pub correlation_id: Option<String>,
}

impl AuditEvent {
    /// Creates a successful event attributed to `actor`, stamped now.
    #[must_use]
    pub fn new(
        actor: &UserIdentity,
        action: AuditAction,
        category: AuditCategory,
        severity: AuditSeverity,
        resource: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let origin = actor.origin().clone();

        Self {
            actor: AuditActor {
                subject: actor.subject().to_owned(),
                email: actor.email().map(str::to_owned),
                name: Some(actor.display_name().to_owned()),
            },
            action,
            resource: resource.into(),
            resource_id: None,
            category,
            severity,
            outcome: AuditOutcome::Success,
            occurred_at: Utc::now().trunc_subsecs(6),
            description: description.into(),
            changes: None,
            ip_address: origin.ip_address,
            user_agent: origin.user_agent,
            session_id: origin.session_id,
            correlation_id: origin.correlation_id,
        }
    }

    /// Sets the resource identifier.
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Sets the outcome.
    #[must_use]
    pub fn with_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Attaches a before/after snapshot.
    #[must_use]
    pub fn with_changes(mut self, before: Option<Value>, after: Option<Value>) -> Self {
        self.changes = Some(AuditChanges { before, after });
        self
    }

    /// Overrides the event timestamp, truncated to microseconds like every store.
    #[must_use]
    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at.trunc_subsecs(6);
        self
    }
}
