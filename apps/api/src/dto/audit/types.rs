use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// API representation of an audit log entry.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-log-entry-response.ts"
)]
pub struct AuditLogEntryResponse {
    pub entry_id: String,
    #[ts(type = "number")]
    pub sequence: u64,
    pub actor_subject: String,
    pub actor_email: Option<String>,
    pub actor_name: Option<String>,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub category: String,
    pub severity: String,
    pub outcome: String,
    pub occurred_at: String,
    pub description: String,
    #[ts(type = "{ before: unknown, after: unknown } | null")]
    pub changes: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub correlation_id: Option<String>,
}

/// One page of audit entries.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-log-page-response.ts"
)]
pub struct AuditLogPageResponse {
    pub entries: Vec<AuditLogEntryResponse>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// Entry count of one principal.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/principal-activity-response.ts"
)]
pub struct PrincipalActivityResponse {
    pub subject: String,
    #[ts(type = "number")]
    pub event_count: u64,
}

/// Aggregate audit counts over a time range.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-statistics-response.ts"
)]
pub struct AuditStatisticsResponse {
    pub from: Option<String>,
    pub to: Option<String>,
    #[ts(type = "number")]
    pub total_entries: u64,
    #[ts(type = "Record<string, number>")]
    pub by_category: BTreeMap<String, u64>,
    #[ts(type = "Record<string, number>")]
    pub by_action: BTreeMap<String, u64>,
    #[ts(type = "Record<string, number>")]
    pub by_severity: BTreeMap<String, u64>,
    #[ts(type = "Record<string, number>")]
    pub by_outcome: BTreeMap<String, u64>,
    pub top_principals: Vec<PrincipalActivityResponse>,
    #[ts(type = "number")]
    pub security_events: u64,
    #[ts(type = "number")]
    pub failed_logins: u64,
}

/// Incoming payload for an audit retention purge.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-purge-request.ts"
)]
pub struct AuditPurgeRequest {
    pub retention_days: u32,
}

/// Result of an audit retention purge.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-purge-result-response.ts"
)]
pub struct AuditPurgeResultResponse {
    pub retention_days: u32,
    #[ts(type = "number")]
    pub deleted_count: u64,
}
