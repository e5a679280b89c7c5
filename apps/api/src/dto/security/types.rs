use serde::{Deserialize, Serialize};
use shopfloor_domain::ConditionValue;
use ts_rs::TS;

/// Condition attached to a permission or a direct grant.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/condition-payload.ts"
)]
pub struct ConditionPayload {
    pub field: String,
    pub operator: String,
    #[ts(type = "boolean | number | string | Array<unknown>")]
    pub value: ConditionValue,
}

/// Incoming payload for permission creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/create-permission-request.ts"
)]
pub struct CreatePermissionRequest {
    pub resource: String,
    pub action: String,
    pub description: String,
    pub category: String,
    pub level: String,
    #[serde(default)]
    pub conditions: Vec<ConditionPayload>,
}

/// API representation of a catalog permission.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permission-response.ts"
)]
pub struct PermissionResponse {
    pub permission_id: String,
    pub resource: String,
    pub action: String,
    pub description: String,
    pub category: String,
    pub level: String,
    pub conditions: Vec<ConditionPayload>,
}

/// Incoming payload for role creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/create-role-request.ts"
)]
pub struct CreateRoleRequest {
    pub role_id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub level: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub inherits_from: Vec<String>,
}

/// Incoming payload replacing a role's attributes.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/update-role-request.ts"
)]
pub struct UpdateRoleRequest {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub level: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub inherits_from: Vec<String>,
    #[ts(type = "number")]
    pub expected_version: u64,
}

/// API representation of a role.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-response.ts"
)]
pub struct RoleResponse {
    pub role_id: String,
    pub display_name: String,
    pub description: String,
    pub level: String,
    pub permissions: Vec<String>,
    pub inherits_from: Vec<String>,
    pub is_active: bool,
    pub is_system: bool,
    #[ts(type = "number")]
    pub version: u64,
    pub updated_at: String,
}

/// Permission reachable through a role, with the role that attaches it.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/resolved-permission-response.ts"
)]
pub struct ResolvedPermissionResponse {
    pub role_id: String,
    pub permission: PermissionResponse,
}

/// Catalog integrity finding.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-integrity-issue-response.ts"
)]
pub struct RoleIntegrityIssueResponse {
    pub kind: String,
    pub role_id: String,
    pub reference: Option<String>,
    pub description: String,
}

/// Incoming payload for a role assignment.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/assign-role-request.ts"
)]
pub struct AssignRoleRequest {
    pub principal: String,
    pub role_id: String,
    pub expires_at: Option<String>,
    pub reason: Option<String>,
}

/// Incoming payload for a direct permission grant.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/assign-permission-request.ts"
)]
pub struct AssignPermissionRequest {
    pub principal: String,
    pub permission_id: String,
    pub expires_at: Option<String>,
    pub reason: Option<String>,
    pub conditions: Option<Vec<ConditionPayload>>,
}

/// Incoming payload revoking every active grant of one target.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/revoke-grant-request.ts"
)]
pub struct RevokeGrantRequest {
    pub principal: String,
    pub target_id: String,
}

/// API representation of a grant assignment.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/grant-response.ts"
)]
pub struct GrantResponse {
    pub grant_id: String,
    pub principal: String,
    pub target_kind: String,
    pub target_id: String,
    pub granted_by: String,
    pub granted_at: String,
    pub expires_at: Option<String>,
    pub conditions: Option<Vec<ConditionPayload>>,
    pub is_active: bool,
    pub reason: Option<String>,
    pub revoked_by: Option<String>,
    pub revoked_at: Option<String>,
}
