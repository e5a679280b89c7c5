use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use shopfloor_application::{AuditCursor, AuditEvent, AuditLogFilter, AuditOrder, AuditStore};
use shopfloor_core::AppResult;
use shopfloor_domain::AuditLogEntry;

/// In-memory append-only audit store.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditLogEntry>>,
    sequence: AtomicU64,
}

impl InMemoryAuditStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn put(&self, event: AuditEvent) -> AppResult<AuditLogEntry> {
        let mut entries = self.entries.write().await;
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let entry = AuditLogEntry {
            entry_id: Uuid::new_v4().to_string(),
            sequence,
            actor: event.actor,
            action: event.action,
            resource: event.resource,
            resource_id: event.resource_id,
            category: event.category,
            severity: event.severity,
            outcome: event.outcome,
            occurred_at: event.occurred_at.trunc_subsecs(6),
            description: event.description,
            changes: event.changes,
            ip_address: event.ip_address,
            user_agent: event.user_agent,
            session_id: event.session_id,
            correlation_id: event.correlation_id,
        };
        entries.push(entry.clone());

        Ok(entry)
    }

    async fn query(
        &self,
        filter: &AuditLogFilter,
        order: AuditOrder,
        limit: usize,
        cursor: Option<AuditCursor>,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let entries = self.entries.read().await;
        let mut matching: Vec<&AuditLogEntry> = entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .filter(|entry| {
                cursor
                    .as_ref()
                    .is_none_or(|cursor| order.is_past_cursor(entry, cursor))
            })
            .collect();
        matching.sort_by(|left, right| order.compare(left, right));

        Ok(matching.into_iter().take(limit).cloned().collect())
    }

    async fn get(&self, entry_id: &str) -> AppResult<Option<AuditLogEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .find(|entry| entry.entry_id == entry_id)
            .cloned())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| entry.occurred_at >= cutoff);

        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests;
