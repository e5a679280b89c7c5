
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shopfloor_application::{AuditCursor, AuditEvent, AuditLogFilter, AuditOrder, AuditStore};
use shopfloor_core::{AppError, AppResult};
use shopfloor_domain::{AuditActor, AuditChanges, AuditLogEntry};

use crate::postgres_errors::map_sqlx_error;

const ENTRY_COLUMNS: &str = r#"
    sequence,
    entry_id,
    occurred_at,
    actor_subject,
    actor_email,
    actor_name,
    action,
    resource,
    resource_id,
    category,
    severity,
    outcome,
    description,
    changes,
    ip_address,
    user_agent,
    session_id,
    correlation_id
"#;

/// PostgreSQL-backed append-only audit store.
#[derive(Clone)]
pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditEntryRow {
    sequence: i64,
    entry_id: Uuid,
    occurred_at: DateTime<Utc>,
    actor_subject: String,
    actor_email: Option<String>,
    actor_name: Option<String>,
    action: String,
    resource: String,
    resource_id: Option<String>,
    category: String,
    severity: String,
    outcome: String,
    description: String,
    changes: Option<Json<AuditChanges>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    session_id: Option<String>,
    correlation_id: Option<String>,
}

impl TryFrom<AuditEntryRow> for AuditLogEntry {
    type Error = AppError;

    fn try_from(row: AuditEntryRow) -> Result<Self, Self::Error> {
        let corrupt = |error: AppError| {
            AppError::Internal(format!(
                "audit entry '{}' holds an unreadable value: {error}",
                row.entry_id
            ))
        };

        Ok(Self {
            entry_id: row.entry_id.to_string(),
            sequence: u64::try_from(row.sequence).map_err(|_| {
                AppError::Internal(format!("audit entry '{}' has a negative sequence", row.entry_id))
            })?,
            actor: AuditActor {
                subject: row.actor_subject,
                email: row.actor_email,
                name: row.actor_name,
            },
            action: row.action.parse().map_err(corrupt)?,
            resource: row.resource,
            resource_id: row.resource_id,
            category: row.category.parse().map_err(corrupt)?,
            severity: row.severity.parse().map_err(corrupt)?,
            outcome: row.outcome.parse().map_err(corrupt)?,
            occurred_at: row.occurred_at,
            description: row.description,
            changes: row.changes.map(|changes| changes.0),
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            session_id: row.session_id,
            correlation_id: row.correlation_id,
        })
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn put(&self, event: AuditEvent) -> AppResult<AuditLogEntry> {
        let sql = format!(
            r#"
            INSERT INTO audit_entries (
                entry_id,
                occurred_at,
                actor_subject,
                actor_email,
                actor_name,
                action,
                resource,
                resource_id,
                category,
                severity,
                outcome,
                description,
                changes,
                ip_address,
                user_agent,
                session_id,
                correlation_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {ENTRY_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, AuditEntryRow>(sql.as_str())
            .bind(Uuid::new_v4())
            .bind(event.occurred_at)
            .bind(event.actor.subject)
            .bind(event.actor.email)
            .bind(event.actor.name)
            .bind(event.action.as_str())
            .bind(event.resource)
            .bind(event.resource_id)
            .bind(event.category.as_str())
            .bind(event.severity.as_str())
            .bind(event.outcome.as_str())
            .bind(event.description)
            .bind(event.changes.map(Json))
            .bind(event.ip_address)
            .bind(event.user_agent)
            .bind(event.session_id)
            .bind(event.correlation_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| map_sqlx_error(error, "failed to append audit entry"))?;

        row.try_into()
    }

    async fn query(
        &self,
        filter: &AuditLogFilter,
        order: AuditOrder,
        limit: usize,
        cursor: Option<AuditCursor>,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let (comparison, direction) = match order {
            AuditOrder::NewestFirst => ("<", "DESC"),
            AuditOrder::OldestFirst => (">", "ASC"),
        };
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM audit_entries
            WHERE ($1::TEXT IS NULL OR actor_subject = $1)
                AND ($2::TEXT IS NULL OR action = $2)
                AND ($3::TEXT IS NULL OR resource = $3)
                AND ($4::TEXT IS NULL OR category = $4)
                AND ($5::TEXT IS NULL OR severity = $5)
                AND ($6::TEXT IS NULL OR outcome = $6)
                AND ($7::TIMESTAMPTZ IS NULL OR occurred_at >= $7)
                AND ($8::TIMESTAMPTZ IS NULL OR occurred_at <= $8)
                AND (
                    $9::TEXT IS NULL
                    OR strpos(lower(actor_subject), $9) > 0
                    OR strpos(lower(coalesce(actor_email, '')), $9) > 0
                    OR strpos(lower(coalesce(actor_name, '')), $9) > 0
                    OR strpos(lower(description), $9) > 0
                    OR strpos(lower(action), $9) > 0
                    OR strpos(lower(resource), $9) > 0
                    OR strpos(lower(coalesce(ip_address, '')), $9) > 0
                )
                AND (
                    $10::TIMESTAMPTZ IS NULL
                    OR (occurred_at, sequence) {comparison} ($10::TIMESTAMPTZ, $11::BIGINT)
                )
            ORDER BY occurred_at {direction}, sequence {direction}
            LIMIT $12
            "#
        );

        let cursor_sequence = cursor
            .map(|cursor| sequence_column(cursor.sequence))
            .transpose()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, AuditEntryRow>(sql.as_str())
            .bind(filter.subject.as_deref())
            .bind(filter.action.map(|action| action.as_str()))
            .bind(filter.resource.as_deref())
            .bind(filter.category.map(|category| category.as_str()))
            .bind(filter.severity.map(|severity| severity.as_str()))
            .bind(filter.outcome.map(|outcome| outcome.as_str()))
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.normalized_search())
            .bind(cursor.map(|cursor| cursor.occurred_at))
            .bind(cursor_sequence)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| map_sqlx_error(error, "failed to query audit entries"))?;

        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }

    async fn get(&self, entry_id: &str) -> AppResult<Option<AuditLogEntry>> {
        let Ok(entry_id) = Uuid::parse_str(entry_id) else {
            return Ok(None);
        };

        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM audit_entries
            WHERE entry_id = $1
            "#
        );
        let row = sqlx::query_as::<_, AuditEntryRow>(sql.as_str())
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| map_sqlx_error(error, "failed to find audit entry"))?;

        row.map(AuditLogEntry::try_from).transpose()
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM audit_entries
            WHERE occurred_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "failed to purge audit entries"))?;

        tracing::debug!(purged = result.rows_affected(), "deleted audit entries");
        Ok(result.rows_affected())
    }
}

fn sequence_column(sequence: u64) -> AppResult<i64> {
    i64::try_from(sequence)
        .map_err(|_| AppError::Validation(format!("audit cursor sequence {sequence} is out of range")))
}
