use std::collections::BTreeMap;

use shopfloor_application::{AuditLogPage, AuditStatistics, PrincipalActivity};
use shopfloor_domain::AuditLogEntry;

use super::types::{
    AuditLogEntryResponse, AuditLogPageResponse, AuditStatisticsResponse,
    PrincipalActivityResponse,
};
use crate::dto::common::format_timestamp;

impl From<AuditLogEntry> for AuditLogEntryResponse {
    fn from(value: AuditLogEntry) -> Self {
        let changes = value.changes.as_ref().and_then(|changes| {
            serde_json::to_value(changes)
                .inspect_err(|error| {
                    tracing::warn!(
                        entry_id = value.entry_id.as_str(),
                        %error,
                        "failed to serialize audit changes"
                    );
                })
                .ok()
        });

        Self {
            entry_id: value.entry_id,
            sequence: value.sequence,
            actor_subject: value.actor.subject,
            actor_email: value.actor.email,
            actor_name: value.actor.name,
            action: value.action.as_str().to_owned(),
            resource: value.resource,
            resource_id: value.resource_id,
            category: value.category.as_str().to_owned(),
            severity: value.severity.as_str().to_owned(),
            outcome: value.outcome.as_str().to_owned(),
            occurred_at: format_timestamp(value.occurred_at),
            description: value.description,
            changes,
            ip_address: value.ip_address,
            user_agent: value.user_agent,
            session_id: value.session_id,
            correlation_id: value.correlation_id,
        }
    }
}

impl From<AuditLogPage> for AuditLogPageResponse {
    fn from(value: AuditLogPage) -> Self {
        Self {
            entries: value
                .entries
                .into_iter()
                .map(AuditLogEntryResponse::from)
                .collect(),
            has_more: value.has_more,
            next_cursor: value.next_cursor.map(|cursor| cursor.encode()),
        }
    }
}

impl From<PrincipalActivity> for PrincipalActivityResponse {
    fn from(value: PrincipalActivity) -> Self {
        Self {
            subject: value.subject,
            event_count: value.event_count,
        }
    }
}

fn labelled<K: std::fmt::Display>(counts: BTreeMap<K, u64>) -> BTreeMap<String, u64> {
    counts
        .into_iter()
        .map(|(key, count)| (key.to_string(), count))
        .collect()
}

impl From<AuditStatistics> for AuditStatisticsResponse {
    fn from(value: AuditStatistics) -> Self {
        Self {
            from: value.from.map(format_timestamp),
            to: value.to.map(format_timestamp),
            total_entries: value.total_entries,
            by_category: labelled(value.by_category),
            by_action: labelled(value.by_action),
            by_severity: labelled(value.by_severity),
            by_outcome: labelled(value.by_outcome),
            top_principals: value
                .top_principals
                .into_iter()
                .map(PrincipalActivityResponse::from)
                .collect(),
            security_events: value.security_events,
            failed_logins: value.failed_logins,
        }
    }
}
