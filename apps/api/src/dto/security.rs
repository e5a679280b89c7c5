mod conversions;
mod types;

pub use types::{
    AssignPermissionRequest, AssignRoleRequest, ConditionPayload, CreatePermissionRequest,
    CreateRoleRequest, GrantResponse, PermissionResponse, ResolvedPermissionResponse,
    RevokeGrantRequest, RoleIntegrityIssueResponse, RoleResponse, UpdateRoleRequest,
};
