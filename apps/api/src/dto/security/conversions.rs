use shopfloor_application::{AssignGrantInput, ResolvedPermission, RoleIntegrityIssue};
use shopfloor_core::AppError;
use shopfloor_domain::{
    ConditionOperator, GrantAssignment, PermissionAction, PermissionCondition,
    PermissionDefinition, PermissionDefinitionInput, PermissionLevel, RoleDefinition,
    RoleDefinitionInput, RoleLevel,
};

use super::types::{
    AssignPermissionRequest, AssignRoleRequest, ConditionPayload, CreatePermissionRequest,
    CreateRoleRequest, GrantResponse, PermissionResponse, ResolvedPermissionResponse,
    RoleIntegrityIssueResponse, RoleResponse, UpdateRoleRequest,
};
use crate::dto::common::{format_timestamp, parse_timestamp};

impl TryFrom<ConditionPayload> for PermissionCondition {
    type Error = AppError;

    fn try_from(value: ConditionPayload) -> Result<Self, Self::Error> {
        let operator = value.operator.parse::<ConditionOperator>()?;
        PermissionCondition::new(value.field, operator, value.value)
    }
}

impl From<&PermissionCondition> for ConditionPayload {
    fn from(value: &PermissionCondition) -> Self {
        Self {
            field: value.field().to_owned(),
            operator: value.operator().as_str().to_owned(),
            value: value.value().clone(),
        }
    }
}

fn parse_conditions(payloads: Vec<ConditionPayload>) -> Result<Vec<PermissionCondition>, AppError> {
    payloads.into_iter().map(PermissionCondition::try_from).collect()
}

impl TryFrom<CreatePermissionRequest> for PermissionDefinitionInput {
    type Error = AppError;

    fn try_from(value: CreatePermissionRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            resource: value.resource,
            action: value.action.parse::<PermissionAction>()?,
            description: value.description,
            category: value.category,
            level: value.level.parse::<PermissionLevel>()?,
            conditions: parse_conditions(value.conditions)?,
        })
    }
}

impl From<PermissionDefinition> for PermissionResponse {
    fn from(value: PermissionDefinition) -> Self {
        Self {
            permission_id: value.permission_id(),
            resource: value.resource().to_owned(),
            action: value.action().as_str().to_owned(),
            description: value.description().to_owned(),
            category: value.category().to_owned(),
            level: value.level().as_str().to_owned(),
            conditions: value.conditions().iter().map(ConditionPayload::from).collect(),
        }
    }
}

impl TryFrom<CreateRoleRequest> for RoleDefinitionInput {
    type Error = AppError;

    fn try_from(value: CreateRoleRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            role_id: value.role_id,
            display_name: value.display_name,
            description: value.description,
            level: value.level.parse::<RoleLevel>()?,
            permissions: value.permissions,
            inherits_from: value.inherits_from,
            is_system: false,
        })
    }
}

impl UpdateRoleRequest {
    /// Splits the payload into the replacement attributes and the expected version.
    pub fn into_input(self, role_id: String) -> Result<(RoleDefinitionInput, u64), AppError> {
        let input = RoleDefinitionInput {
            role_id,
            display_name: self.display_name,
            description: self.description,
            level: self.level.parse::<RoleLevel>()?,
            permissions: self.permissions,
            inherits_from: self.inherits_from,
            is_system: false,
        };

        Ok((input, self.expected_version))
    }
}

impl From<RoleDefinition> for RoleResponse {
    fn from(value: RoleDefinition) -> Self {
        Self {
            role_id: value.role_id().to_owned(),
            display_name: value.display_name().to_owned(),
            description: value.description().to_owned(),
            level: value.level().as_str().to_owned(),
            permissions: value.permissions().iter().cloned().collect(),
            inherits_from: value.inherits_from().to_vec(),
            is_active: value.is_active(),
            is_system: value.is_system(),
            version: value.version(),
            updated_at: format_timestamp(value.updated_at()),
        }
    }
}

impl From<ResolvedPermission> for ResolvedPermissionResponse {
    fn from(value: ResolvedPermission) -> Self {
        Self {
            role_id: value.role_id,
            permission: PermissionResponse::from(value.permission),
        }
    }
}

impl From<RoleIntegrityIssue> for RoleIntegrityIssueResponse {
    fn from(value: RoleIntegrityIssue) -> Self {
        let description = value.describe();
        let (kind, role_id, reference) = match value {
            RoleIntegrityIssue::UnknownPermission {
                role_id,
                permission_id,
            } => ("unknown_permission", role_id, Some(permission_id)),
            RoleIntegrityIssue::UnknownParent { role_id, parent_id } => {
                ("unknown_parent", role_id, Some(parent_id))
            }
            RoleIntegrityIssue::InheritanceCycle { role_id } => {
                ("inheritance_cycle", role_id, None)
            }
        };

        Self {
            kind: kind.to_owned(),
            role_id,
            reference,
            description,
        }
    }
}

impl TryFrom<AssignRoleRequest> for AssignGrantInput {
    type Error = AppError;

    fn try_from(value: AssignRoleRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            principal: value.principal,
            target_id: value.role_id,
            expires_at: value
                .expires_at
                .as_deref()
                .map(|expires_at| parse_timestamp("expires_at", expires_at))
                .transpose()?,
            reason: value.reason,
            conditions: None,
        })
    }
}

impl TryFrom<AssignPermissionRequest> for AssignGrantInput {
    type Error = AppError;

    fn try_from(value: AssignPermissionRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            principal: value.principal,
            target_id: value.permission_id,
            expires_at: value
                .expires_at
                .as_deref()
                .map(|expires_at| parse_timestamp("expires_at", expires_at))
                .transpose()?,
            reason: value.reason,
            conditions: value.conditions.map(parse_conditions).transpose()?,
        })
    }
}

impl From<GrantAssignment> for GrantResponse {
    fn from(value: GrantAssignment) -> Self {
        Self {
            grant_id: value.grant_id,
            principal: value.principal,
            target_kind: value.target.kind().to_owned(),
            target_id: value.target.target_id().to_owned(),
            granted_by: value.granted_by,
            granted_at: format_timestamp(value.granted_at),
            expires_at: value.expires_at.map(format_timestamp),
            conditions: value
                .conditions
                .as_deref()
                .map(|conditions| conditions.iter().map(ConditionPayload::from).collect()),
            is_active: value.is_active,
            reason: value.reason,
            revoked_by: value.revoked_by,
            revoked_at: value.revoked_at.map(format_timestamp),
        }
    }
}
