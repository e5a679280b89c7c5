mod access;
mod audit;
pub(crate) mod common;
mod security;

pub use access::{AccessDecisionResponse, CheckAccessRequest};
pub use audit::{
    AuditLogEntryResponse, AuditLogPageResponse, AuditPurgeRequest, AuditPurgeResultResponse,
    AuditStatisticsResponse, PrincipalActivityResponse,
};
pub use common::{HealthDependencyStatus, HealthResponse};
pub use security::{
    AssignPermissionRequest, AssignRoleRequest, ConditionPayload, CreatePermissionRequest,
    CreateRoleRequest, GrantResponse, PermissionResponse, ResolvedPermissionResponse,
    RevokeGrantRequest, RoleIntegrityIssueResponse, RoleResponse, UpdateRoleRequest,
};
