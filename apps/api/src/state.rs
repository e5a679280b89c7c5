use std::sync::Arc;

use ipnet::IpNet;
use shopfloor_application::{
    AuditLogService, AuditSink, CatalogService, GrantService, PermissionEngine,
};
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub permission_engine: PermissionEngine,
    pub catalog_service: CatalogService,
    pub grant_service: GrantService,
    pub audit_log_service: AuditLogService,
    pub audit_sink: AuditSink,
    pub postgres_pool: Option<PgPool>,
    pub trusted_proxies: Arc<[IpNet]>,
    pub frontend_url: String,
}
