use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::types::Json;

use shopfloor_application::GrantRepository;
use shopfloor_core::AppResult;
use shopfloor_domain::GrantAssignment;

use super::PostgresAccessRepository;
use crate::postgres_errors::{map_insert_error, map_sqlx_error};

#[async_trait]
impl GrantRepository for PostgresAccessRepository {
    async fn list_grants_for_principal(
        &self,
        principal: &str,
    ) -> AppResult<Vec<GrantAssignment>> {
        let rows = sqlx::query_scalar::<_, Json<GrantAssignment>>(
            r#"
            SELECT document
            FROM access_grants
            WHERE principal = $1
            ORDER BY granted_at, grant_id
            "#,
        )
        .bind(principal)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "failed to list grants"))?;

        Ok(rows.into_iter().map(|document| document.0).collect())
    }

    async fn insert_grant(&self, grant: GrantAssignment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO access_grants (
                grant_id,
                principal,
                is_active,
                expires_at,
                granted_at,
                document
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(grant.grant_id.as_str())
        .bind(grant.principal.as_str())
        .bind(grant.is_active)
        .bind(grant.expires_at)
        .bind(grant.granted_at)
        .bind(Json(&grant))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_insert_error(
                error,
                "failed to insert grant",
                format!(
                    "grant '{}' duplicates an active grant of '{}' for '{}'",
                    grant.grant_id,
                    grant.target.target_id(),
                    grant.principal
                ),
            )
        })?;

        Ok(())
    }

    async fn deactivate_grant(
        &self,
        grant_id: &str,
        revoked_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let revocation = json!({
            "is_active": false,
            "revoked_by": revoked_by,
            "revoked_at": at,
        });

        let rows_affected = sqlx::query(
            r#"
            UPDATE access_grants
            SET is_active = false,
                document = document || $2
            WHERE grant_id = $1
                AND is_active
            "#,
        )
        .bind(grant_id)
        .bind(Json(revocation))
        .execute(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "failed to deactivate grant"))?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn list_expired_active_grants(
        &self,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<GrantAssignment>> {
        let rows = sqlx::query_scalar::<_, Json<GrantAssignment>>(
            r#"
            SELECT document
            FROM access_grants
            WHERE is_active
                AND expires_at IS NOT NULL
                AND expires_at <= $1
            ORDER BY expires_at, grant_id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "failed to list expired grants"))?;

        Ok(rows.into_iter().map(|document| document.0).collect())
    }
}
