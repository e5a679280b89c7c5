use async_trait::async_trait;
use sqlx::types::Json;

use shopfloor_application::RoleRepository;
use shopfloor_core::{AppError, AppResult};
use shopfloor_domain::RoleDefinition;

use super::PostgresAccessRepository;
use crate::postgres_errors::{map_insert_error, map_sqlx_error};

#[async_trait]
impl RoleRepository for PostgresAccessRepository {
    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>> {
        let rows = sqlx::query_scalar::<_, Json<RoleDefinition>>(
            r#"
            SELECT document
            FROM access_roles
            ORDER BY role_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "failed to list roles"))?;

        Ok(rows.into_iter().map(|document| document.0).collect())
    }

    async fn find_role(&self, role_id: &str) -> AppResult<Option<RoleDefinition>> {
        let row = sqlx::query_scalar::<_, Json<RoleDefinition>>(
            r#"
            SELECT document
            FROM access_roles
            WHERE role_id = $1
            "#,
        )
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "failed to find role"))?;

        Ok(row.map(|document| document.0))
    }

    async fn insert_role(&self, role: RoleDefinition) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO access_roles (role_id, version, is_active, document, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(role.role_id())
        .bind(version_column(role.version())?)
        .bind(role.is_active())
        .bind(Json(&role))
        .bind(role.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_insert_error(
                error,
                "failed to insert role",
                format!("role '{}' already exists", role.role_id()),
            )
        })?;

        Ok(())
    }

    async fn update_role(&self, role: RoleDefinition, expected_version: u64) -> AppResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE access_roles
            SET version = $2,
                is_active = $3,
                document = $4,
                updated_at = $5
            WHERE role_id = $1
                AND version = $6
            "#,
        )
        .bind(role.role_id())
        .bind(version_column(role.version())?)
        .bind(role.is_active())
        .bind(Json(&role))
        .bind(role.updated_at())
        .bind(version_column(expected_version)?)
        .execute(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "failed to update role"))?
        .rows_affected();

        if rows_affected == 1 {
            return Ok(());
        }

        let stored_version = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT version
            FROM access_roles
            WHERE role_id = $1
            "#,
        )
        .bind(role.role_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "failed to resolve role version"))?;

        match stored_version {
            Some(stored_version) => Err(AppError::Conflict(format!(
                "role '{}' is at version {stored_version}, expected {expected_version}",
                role.role_id()
            ))),
            None => Err(AppError::NotFound(format!(
                "role '{}' does not exist",
                role.role_id()
            ))),
        }
    }
}

fn version_column(version: u64) -> AppResult<i64> {
    i64::try_from(version)
        .map_err(|_| AppError::Validation(format!("role version {version} is out of range")))
}
