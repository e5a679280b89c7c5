
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use shopfloor_core::{AppError, AppResult, UserIdentity};
use shopfloor_domain::{
    AUDIT_RESOURCE, AuditAction, AuditCategory, AuditLogEntry, AuditSeverity, PermissionAction,
};

use crate::audit_log::AuditLog;
use crate::audit_ports::{AuditEvent, AuditLogFilter, AuditLogPage, AuditLogQuery, AuditStatistics};
use crate::audit_sink::AuditSink;
use crate::permission_engine::PermissionEngine;

/// Permission-gated access to the audit trail.
#[derive(Clone)]
pub struct AuditLogService {
    audit_log: AuditLog,
    engine: PermissionEngine,
    audit: AuditSink,
}

impl AuditLogService {
    /// Creates a new audit log service.
    #[must_use]
    pub fn new(audit_log: AuditLog, engine: PermissionEngine, audit: AuditSink) -> Self {
        Self {
            audit_log,
            engine,
            audit,
        }
    }

    /// Lists audit entries, most recent first.
    pub async fn query(&self, actor: &UserIdentity, query: AuditLogQuery) -> AppResult<AuditLogPage> {
        self.require(actor, PermissionAction::Read).await?;
        self.audit_log.query(query).await
    }

    /// Lists audit entries matching a free-text term.
    pub async fn search(
        &self,
        actor: &UserIdentity,
        term: &str,
        query: AuditLogQuery,
    ) -> AppResult<AuditLogPage> {
        self.require(actor, PermissionAction::Read).await?;
        self.audit_log.search(term, query).await
    }

    /// Aggregates audit entries in a time range.
    pub async fn statistics(
        &self,
        actor: &UserIdentity,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> AppResult<AuditStatistics> {
        self.require(actor, PermissionAction::Read).await?;
        self.audit_log.statistics(from, to).await
    }

    /// Returns one audit entry.
    pub async fn get(&self, actor: &UserIdentity, entry_id: &str) -> AppResult<AuditLogEntry> {
        self.require(actor, PermissionAction::Read).await?;
        self.audit_log.get(entry_id).await
    }

    /// Renders matching entries as CSV.
    ///
    /// The export itself is recorded before the document is returned.
    pub async fn export(&self, actor: &UserIdentity, filter: AuditLogFilter) -> AppResult<String> {
        self.require(actor, PermissionAction::Export).await?;

        let export = self.audit_log.export(&filter).await?;
        let rows = export.rows;
        self.audit
            .emit_committed(
                AuditEvent::new(
                    actor,
                    AuditAction::AuditExported,
                    AuditCategory::Security,
                    AuditSeverity::High,
                    AUDIT_RESOURCE,
                    format!("exported {rows} audit entries"),
                )
                .with_changes(None, Some(export_snapshot(&filter, rows))),
            )
            .await?;

        tracing::info!(actor = actor.subject(), rows, "exported audit log");
        Ok(export.csv)
    }

    /// Deletes entries older than `retention_days`, returning the count.
    ///
    /// A critical audit record of the purge is committed first; the purge
    /// does not run when it cannot be stored.
    pub async fn purge_older_than(
        &self,
        actor: &UserIdentity,
        retention_days: u32,
    ) -> AppResult<u64> {
        self.require(actor, PermissionAction::Manage).await?;
        if retention_days == 0 {
            return Err(AppError::Validation(
                "audit retention must be at least one day".to_owned(),
            ));
        }

        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        self.audit
            .emit_committed(
                AuditEvent::new(
                    actor,
                    AuditAction::AuditPurged,
                    AuditCategory::Security,
                    AuditSeverity::Critical,
                    AUDIT_RESOURCE,
                    format!("purging audit entries older than {retention_days} days"),
                )
                .with_changes(
                    None,
                    Some(json!({
                        "retention_days": retention_days,
                        "cutoff": cutoff.to_rfc3339(),
                    })),
                ),
            )
            .await?;

        let purged = self.audit_log.purge_before(cutoff).await?;
        tracing::warn!(
            actor = actor.subject(),
            retention_days,
            purged,
            "purged audit entries"
        );

        Ok(purged)
    }

    async fn require(&self, actor: &UserIdentity, action: PermissionAction) -> AppResult<()> {
        self.engine
            .require_permission(actor, AUDIT_RESOURCE, action)
            .await
    }
}

fn export_snapshot(filter: &AuditLogFilter, rows: usize) -> serde_json::Value {
    json!({
        "rows": rows,
        "subject": filter.subject,
        "action": filter.action.map(|action| action.as_str()),
        "resource": filter.resource,
        "category": filter.category.map(|category| category.as_str()),
        "severity": filter.severity.map(|severity| severity.as_str()),
        "outcome": filter.outcome.map(|outcome| outcome.as_str()),
        "from": filter.from.map(|from| from.to_rfc3339()),
        "to": filter.to.map(|to| to.to_rfc3339()),
        "search": filter.search,
    })
}
