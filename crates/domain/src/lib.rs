//! Domain entities and invariants for access control and auditing.

#![forbid(unsafe_code)]

mod audit;
mod condition;
mod security;

pub use audit::{
    AuditAction, AuditActor, AuditCategory, AuditChanges, AuditLogEntry, AuditOutcome,
    AuditSeverity,
};
pub use condition::{
    AccessContext, ConditionOperator, ConditionValue, PermissionCondition, conditions_hold,
};
pub use security::{
    AUDIT_RESOURCE, GrantAssignment, GrantTarget, PermissionAction, PermissionDefinition,
    PermissionDefinitionInput, PermissionLevel, RoleDefinition, RoleDefinitionInput, RoleLevel,
    SECURITY_RESOURCE, permission_id,
};
