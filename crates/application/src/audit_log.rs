mod export;


use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use shopfloor_core::{AppError, AppResult};
use shopfloor_domain::{AuditLogEntry, AuditSeverity};

use crate::audit_ports::{
    AuditCursor, AuditEvent, AuditLogFilter, AuditLogPage, AuditLogQuery, AuditOrder,
    AuditStatistics, AuditStatisticsBuilder, AuditStore,
};

pub use export::{AUDIT_EXPORT_COLUMNS, render_audit_csv};

/// Tracing target carrying audit events that could not be persisted.
pub const AUDIT_ESCALATION_TARGET: &str = "shopfloor::audit::escalation";

const SCAN_BATCH_SIZE: usize = 500;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Backoff settings for critical audit appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditRetryPolicy {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub base_delay: Duration,
}

impl Default for AuditRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl AuditRetryPolicy {
    /// Returns the delay before retry number `attempt`, counted from zero.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }
}

/// Rendered audit export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditExport {
    /// Number of exported entries.
    pub rows: usize,
    /// CSV document including the header row.
    pub csv: String,
}

/// Append-only audit log over an [`AuditStore`].
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
    retry: AuditRetryPolicy,
}

impl AuditLog {
    /// Creates an audit log with the given critical-append retry policy.
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>, retry: AuditRetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Records one event.
    ///
    /// Critical events are retried with exponential backoff on transient
    /// store failures. When they still cannot be stored the event is
    /// escalated on [`AUDIT_ESCALATION_TARGET`] and the call fails with
    /// [`AppError::AuditDurability`].
    pub async fn append(&self, event: AuditEvent) -> AppResult<AuditLogEntry> {
        if event.severity != AuditSeverity::Critical {
            return self.store.put(event).await;
        }

        let mut attempt = 0;
        loop {
            match self.store.put(event.clone()).await {
                Ok(entry) => return Ok(entry),
                Err(error) if error.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.retry.max_retries,
                        action = event.action.as_str(),
                        "critical audit append failed, retrying in {delay:?}: {error}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    escalate(&event, attempt + 1, &error);
                    return Err(AppError::AuditDurability(format!(
                        "critical audit event '{}' on '{}' was not persisted after {} attempts: {error}",
                        event.action,
                        event.resource,
                        attempt + 1
                    )));
                }
            }
        }
    }

    /// Returns one page of matching entries, most recent first.
    pub async fn query(&self, query: AuditLogQuery) -> AppResult<AuditLogPage> {
        query.filter.validate()?;
        let limit = query.effective_limit();

        let mut entries = self
            .store
            .query(&query.filter, AuditOrder::NewestFirst, limit + 1, query.cursor)
            .await?;

        let has_more = entries.len() > limit;
        entries.truncate(limit);
        let next_cursor = if has_more {
            entries.last().map(AuditCursor::after)
        } else {
            None
        };

        Ok(AuditLogPage {
            entries,
            has_more,
            next_cursor,
        })
    }

    /// Applies a case-insensitive free-text term on top of [`AuditLog::query`].
    pub async fn search(&self, term: &str, mut query: AuditLogQuery) -> AppResult<AuditLogPage> {
        let term = term.trim();
        if term.is_empty() {
            return Err(AppError::Validation(
                "audit search term must not be empty".to_owned(),
            ));
        }

        query.filter.search = Some(term.to_owned());
        self.query(query).await
    }

    /// Aggregates every entry in the inclusive time range.
    pub async fn statistics(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> AppResult<AuditStatistics> {
        let filter = AuditLogFilter {
            from,
            to,
            ..AuditLogFilter::default()
        };
        filter.validate()?;

        let mut builder = AuditStatisticsBuilder::new(from, to);
        self.scan(&filter, |entry| builder.record(entry)).await?;
        Ok(builder.finish())
    }

    /// Renders every matching entry, oldest first, as CSV.
    pub async fn export(&self, filter: &AuditLogFilter) -> AppResult<AuditExport> {
        filter.validate()?;

        let mut entries = Vec::new();
        self.scan(filter, |entry| entries.push(entry.clone()))
            .await?;
        Ok(AuditExport {
            rows: entries.len(),
            csv: render_audit_csv(&entries),
        })
    }

    /// Finds one entry by identifier.
    pub async fn get(&self, entry_id: &str) -> AppResult<AuditLogEntry> {
        self.store
            .get(entry_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("audit entry '{entry_id}' does not exist")))
    }

    /// Deletes entries older than `cutoff`, returning the count.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        self.store.purge_before(cutoff).await
    }

    async fn scan(
        &self,
        filter: &AuditLogFilter,
        mut visit: impl FnMut(&AuditLogEntry),
    ) -> AppResult<()> {
        let mut cursor = None;
        loop {
            let batch = self
                .store
                .query(filter, AuditOrder::OldestFirst, SCAN_BATCH_SIZE, cursor)
                .await?;

            batch.iter().for_each(&mut visit);
            if batch.len() < SCAN_BATCH_SIZE {
                return Ok(());
            }
            cursor = batch.last().map(AuditCursor::after);
        }
    }
}

fn escalate(event: &AuditEvent, attempts: u32, error: &AppError) {
    let changes = event
        .changes
        .as_ref()
        .and_then(|changes| serde_json::to_string(changes).ok());

    tracing::error!(
        target: AUDIT_ESCALATION_TARGET,
        attempts,
        actor = event.actor.subject.as_str(),
        action = event.action.as_str(),
        category = event.category.as_str(),
        severity = event.severity.as_str(),
        outcome = event.outcome.as_str(),
        resource = event.resource.as_str(),
        resource_id = event.resource_id.as_deref(),
        occurred_at = %event.occurred_at.to_rfc3339(),
        description = event.description.as_str(),
        changes = changes.as_deref(),
        correlation_id = event.correlation_id.as_deref(),
        error = %error,
        "critical audit event could not be persisted"
    );
}
