use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shopfloor_core::AppResult;
use shopfloor_domain::AuditLogEntry;

use super::{AuditCursor, AuditEvent, AuditLogFilter, AuditOrder};

/// Persistence port for the append-only audit log.
///
/// Entries are immutable once stored; the only removal path is an explicit
/// retention purge.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persists an event, assigning its identifier and insertion sequence.
    async fn put(&self, event: AuditEvent) -> AppResult<AuditLogEntry>;

    /// Returns up to `limit` matching entries positioned after `cursor`.
    async fn query(
        &self,
        filter: &AuditLogFilter,
        order: AuditOrder,
        limit: usize,
        cursor: Option<AuditCursor>,
    ) -> AppResult<Vec<AuditLogEntry>>;

    /// Finds one entry by identifier.
    async fn get(&self, entry_id: &str) -> AppResult<Option<AuditLogEntry>>;

    /// Deletes entries that occurred strictly before `cutoff`, returning the count.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}
