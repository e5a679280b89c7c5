//! Application services and ports.

#![forbid(unsafe_code)]

mod access_bootstrap;
mod access_cache;
mod access_ports;
mod audit_log;
mod audit_log_service;
mod audit_ports;
mod audit_sink;
mod catalog_service;
mod grant_service;
mod permission_engine;
mod role_graph;

#[cfg(test)]
mod test_support;

pub use access_bootstrap::{AccessBootstrap, BootstrapReport, SUPER_ADMIN_ROLE};
pub use access_cache::AccessCache;
pub use access_ports::{
    AccessRepositories, AssignGrantInput, GrantRepository, PermissionCatalogRepository,
    RoleRepository,
};
pub use audit_log::{
    AUDIT_ESCALATION_TARGET, AUDIT_EXPORT_COLUMNS, AuditExport, AuditLog, AuditRetryPolicy,
    render_audit_csv,
};
pub use audit_log_service::AuditLogService;
pub use audit_ports::{
    AuditCursor, AuditEvent, AuditLogFilter, AuditLogPage, AuditLogQuery, AuditOrder,
    AuditStatistics, AuditStatisticsBuilder, AuditStore, DEFAULT_AUDIT_PAGE_LIMIT,
    MAX_AUDIT_PAGE_LIMIT, PrincipalActivity, TOP_PRINCIPAL_LIMIT,
};
pub use audit_sink::AuditSink;
pub use catalog_service::CatalogService;
pub use grant_service::GrantService;
pub use permission_engine::{
    AccessDecision, AccessRequest, DecisionSource, DenialKind, PermissionEngine,
};
pub use role_graph::{ResolvedPermission, RoleGraph, RoleIntegrityIssue};
