use async_trait::async_trait;
use sqlx::types::Json;

use shopfloor_application::PermissionCatalogRepository;
use shopfloor_core::AppResult;
use shopfloor_domain::PermissionDefinition;

use super::PostgresAccessRepository;
use crate::postgres_errors::{map_insert_error, map_sqlx_error};

#[async_trait]
impl PermissionCatalogRepository for PostgresAccessRepository {
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        let rows = sqlx::query_scalar::<_, Json<PermissionDefinition>>(
            r#"
            SELECT document
            FROM access_permissions
            ORDER BY permission_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "failed to list permissions"))?;

        Ok(rows.into_iter().map(|document| document.0).collect())
    }

    async fn find_permission(
        &self,
        permission_id: &str,
    ) -> AppResult<Option<PermissionDefinition>> {
        let row = sqlx::query_scalar::<_, Json<PermissionDefinition>>(
            r#"
            SELECT document
            FROM access_permissions
            WHERE permission_id = $1
            "#,
        )
        .bind(permission_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "failed to find permission"))?;

        Ok(row.map(|document| document.0))
    }

    async fn insert_permission(&self, permission: PermissionDefinition) -> AppResult<()> {
        let permission_id = permission.permission_id();
        sqlx::query(
            r#"
            INSERT INTO access_permissions (permission_id, document)
            VALUES ($1, $2)
            "#,
        )
        .bind(permission_id.as_str())
        .bind(Json(&permission))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_insert_error(
                error,
                "failed to insert permission",
                format!("permission '{permission_id}' already exists"),
            )
        })?;

        Ok(())
    }
}
