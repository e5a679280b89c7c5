use std::sync::Arc;

use shopfloor_application::{
    AccessBootstrap, AccessCache, AuditLog, AuditLogService, AuditSink, CatalogService,
    GrantService, PermissionEngine,
};
use shopfloor_core::AppError;
use sqlx::PgPool;
use tracing::info;

use crate::api_config::ApiConfig;
use crate::state::AppState;

mod repositories;

pub async fn build_app_state(
    pool: Option<PgPool>,
    config: &ApiConfig,
) -> Result<AppState, AppError> {
    let stores = repositories::build_store_set(config.access_store, pool.as_ref())?;

    let audit_log = AuditLog::new(stores.audit_store, config.audit_retry);
    let audit_sink = AuditSink::spawn(audit_log.clone());
    let cache = Arc::new(if config.access_cache_enabled {
        AccessCache::new()
    } else {
        AccessCache::disabled()
    });

    let mut permission_engine =
        PermissionEngine::new(stores.access.clone(), cache.clone(), audit_sink.clone());
    if let Some(deadline) = config.access_check_deadline {
        permission_engine = permission_engine.with_deadline(deadline);
    }

    let catalog_service = CatalogService::new(
        stores.access.clone(),
        cache.clone(),
        permission_engine.clone(),
        audit_sink.clone(),
    );
    let grant_service = GrantService::new(
        stores.access.clone(),
        cache.clone(),
        permission_engine.clone(),
        audit_sink.clone(),
    );
    let audit_log_service =
        AuditLogService::new(audit_log, permission_engine.clone(), audit_sink.clone());

    let report = AccessBootstrap::new(stores.access, cache, grant_service.clone())
        .seed_defaults(config.bootstrap_admin_subject.as_deref())
        .await?;
    info!(
        permissions_created = report.permissions_created,
        roles_created = report.roles_created,
        admin_granted = report.admin_granted,
        "access defaults ensured"
    );

    Ok(AppState {
        permission_engine,
        catalog_service,
        grant_service,
        audit_log_service,
        audit_sink,
        postgres_pool: pool,
        trusted_proxies: config.trusted_proxies.clone().into(),
        frontend_url: config.frontend_url.clone(),
    })
}
