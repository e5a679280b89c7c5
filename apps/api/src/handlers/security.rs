use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;

use shopfloor_application::AssignGrantInput;
use shopfloor_core::UserIdentity;
use shopfloor_domain::{PermissionDefinitionInput, RoleDefinitionInput};

use crate::dto::{
    AssignPermissionRequest, AssignRoleRequest, AuditLogEntryResponse, AuditLogPageResponse,
    AuditPurgeRequest, AuditPurgeResultResponse, AuditStatisticsResponse,
    CreatePermissionRequest, CreateRoleRequest, GrantResponse, PermissionResponse,
    ResolvedPermissionResponse, RevokeGrantRequest, RoleIntegrityIssueResponse, RoleResponse,
    UpdateRoleRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

mod audit;
mod grants;
mod permissions;
mod roles;

pub use audit::{
    audit_log_entry_handler, audit_log_statistics_handler, export_audit_log_handler,
    list_audit_log_handler, purge_audit_log_handler, search_audit_log_handler,
};
pub use grants::{
    assign_permission_handler, assign_role_handler, list_principal_grants_handler,
    revoke_grant_handler,
};
pub use permissions::{
    create_permission_handler, list_permissions_handler, permission_integrity_handler,
};
pub use roles::{
    create_role_handler, deactivate_role_handler, list_roles_handler, role_permissions_handler,
    update_role_handler,
};
