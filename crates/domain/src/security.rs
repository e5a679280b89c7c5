use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopfloor_core::{AppError, AppResult, NonEmptyString};

use crate::condition::PermissionCondition;

/// Actions a permission can authorize on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    /// Create new records.
    Create,
    /// Read records.
    Read,
    /// Update existing records.
    Update,
    /// Delete records.
    Delete,
    /// Export data out of the system.
    Export,
    /// Import data into the system.
    Import,
    /// Approve pending work.
    Approve,
    /// Administer the resource itself.
    Manage,
}

impl PermissionAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Export => "export",
            Self::Import => "import",
            Self::Approve => "approve",
            Self::Manage => "manage",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[PermissionAction] = &[
            PermissionAction::Create,
            PermissionAction::Read,
            PermissionAction::Update,
            PermissionAction::Delete,
            PermissionAction::Export,
            PermissionAction::Import,
            PermissionAction::Approve,
            PermissionAction::Manage,
        ];

        ALL
    }
}

impl FromStr for PermissionAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown permission action '{value}'")))
    }
}

/// Sensitivity classification of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// Everyday operational access.
    Basic,
    /// Elevated operational access.
    Advanced,
    /// Administrative access.
    Administrative,
    /// Platform-internal access.
    System,
}

impl PermissionLevel {
    /// Returns a stable storage value for this level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
            Self::Administrative => "administrative",
            Self::System => "system",
        }
    }
}

impl FromStr for PermissionLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "basic" => Ok(Self::Basic),
            "advanced" => Ok(Self::Advanced),
            "administrative" => Ok(Self::Administrative),
            "system" => Ok(Self::System),
            _ => Err(AppError::Validation(format!(
                "unknown permission level '{value}'"
            ))),
        }
    }
}

/// Resource guarding role, permission and grant administration.
pub const SECURITY_RESOURCE: &str = "security";

/// Resource guarding audit log access.
pub const AUDIT_RESOURCE: &str = "audit";

/// Builds the stable identifier of a `(resource, action)` permission.
#[must_use]
pub fn permission_id(resource: &str, action: PermissionAction) -> String {
    format!("{resource}:{}", action.as_str())
}

/// Permission catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    resource: NonEmptyString,
    action: PermissionAction,
    description: String,
    category: String,
    level: PermissionLevel,
    conditions: Vec<PermissionCondition>,
}

/// Input payload for constructing one permission definition.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionDefinitionInput {
    /// Protected resource name, for example `production`.
    pub resource: String,
    /// Authorized action.
    pub action: PermissionAction,
    /// Human-readable description.
    pub description: String,
    /// Grouping tag used by administrative views.
    pub category: String,
    /// Sensitivity level.
    pub level: PermissionLevel,
    /// Conditions applied when no grant-level override exists.
    pub conditions: Vec<PermissionCondition>,
}

impl PermissionDefinition {
    /// Creates a validated permission definition.
    pub fn new(input: PermissionDefinitionInput) -> AppResult<Self> {
        let PermissionDefinitionInput {
            resource,
            action,
            description,
            category,
            level,
            conditions,
        } = input;

        validate_identifier("permission resource", resource.as_str())?;

        Ok(Self {
            resource: NonEmptyString::new(resource)?,
            action,
            description,
            category,
            level,
            conditions,
        })
    }

    /// Returns the stable `resource:action` identifier.
    #[must_use]
    pub fn permission_id(&self) -> String {
        permission_id(self.resource.as_str(), self.action)
    }

    /// Returns the protected resource name.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.resource.as_str()
    }

    /// Returns the authorized action.
    #[must_use]
    pub fn action(&self) -> PermissionAction {
        self.action
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the category tag.
    #[must_use]
    pub fn category(&self) -> &str {
        self.category.as_str()
    }

    /// Returns the sensitivity level.
    #[must_use]
    pub fn level(&self) -> PermissionLevel {
        self.level
    }

    /// Returns default conditions.
    #[must_use]
    pub fn conditions(&self) -> &[PermissionCondition] {
        &self.conditions
    }

    /// Returns whether this permission covers the requested pair.
    #[must_use]
    pub fn matches(&self, resource: &str, action: PermissionAction) -> bool {
        self.resource.as_str() == resource && self.action == action
    }
}

/// Administrative tier of a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleLevel {
    /// Regular operator.
    User,
    /// Shift or department manager.
    Manager,
    /// Business administrator.
    Admin,
    /// Administrator of administrators.
    SuperAdmin,
    /// Platform-internal role.
    System,
}

impl RoleLevel {
    /// Returns a stable storage value for this level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Manager => "manager",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
            Self::System => "system",
        }
    }
}

impl FromStr for RoleLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            "system" => Ok(Self::System),
            _ => Err(AppError::Validation(format!("unknown role level '{value}'"))),
        }
    }
}

/// Role definition holding permission references and inheritance edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    role_id: NonEmptyString,
    display_name: String,
    description: String,
    level: RoleLevel,
    permissions: BTreeSet<String>,
    inherits_from: Vec<String>,
    is_active: bool,
    is_system: bool,
    version: u64,
    updated_at: DateTime<Utc>,
}

/// Input payload for constructing or replacing one role definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinitionInput {
    /// Unique role identifier, also its name.
    pub role_id: String,
    /// Label shown in administrative views.
    pub display_name: String,
    /// Free-text description.
    pub description: String,
    /// Administrative tier.
    pub level: RoleLevel,
    /// Referenced permission identifiers.
    pub permissions: Vec<String>,
    /// Ordered parent roles.
    pub inherits_from: Vec<String>,
    /// Marks platform-managed roles.
    pub is_system: bool,
}

impl RoleDefinition {
    /// Creates a validated, active role at version one.
    pub fn new(input: RoleDefinitionInput, now: DateTime<Utc>) -> AppResult<Self> {
        let RoleDefinitionInput {
            role_id,
            display_name,
            description,
            level,
            permissions,
            inherits_from,
            is_system,
        } = input;

        validate_identifier("role id", role_id.as_str())?;
        let inherits_from = normalize_parents(role_id.as_str(), inherits_from)?;
        let display_name = if display_name.trim().is_empty() {
            role_id.clone()
        } else {
            display_name
        };

        Ok(Self {
            role_id: NonEmptyString::new(role_id)?,
            display_name,
            description,
            level,
            permissions: permissions.into_iter().collect(),
            inherits_from,
            is_active: true,
            is_system,
            version: 1,
            updated_at: now,
        })
    }

    /// Returns a copy with replaced attributes and the next version.
    pub fn revised(&self, input: RoleDefinitionInput, now: DateTime<Utc>) -> AppResult<Self> {
        if input.role_id != self.role_id.as_str() {
            return Err(AppError::Validation(format!(
                "role id '{}' cannot be renamed to '{}'",
                self.role_id, input.role_id
            )));
        }

        let mut revised = Self::new(input, now)?;
        revised.is_active = self.is_active;
        revised.is_system = self.is_system;
        revised.version = self.version.saturating_add(1);
        Ok(revised)
    }

    /// Returns an inactive copy with the next version.
    #[must_use]
    pub fn deactivated(&self, now: DateTime<Utc>) -> Self {
        let mut deactivated = self.clone();
        deactivated.is_active = false;
        deactivated.version = self.version.saturating_add(1);
        deactivated.updated_at = now;
        deactivated
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn role_id(&self) -> &str {
        self.role_id.as_str()
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the administrative tier.
    #[must_use]
    pub fn level(&self) -> RoleLevel {
        self.level
    }

    /// Returns directly attached permission identifiers in sorted order.
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Returns parent roles in declaration order.
    #[must_use]
    pub fn inherits_from(&self) -> &[String] {
        &self.inherits_from
    }

    /// Returns whether the role participates in resolution.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns whether the role is platform-managed.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Returns the optimistic concurrency version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the last modification timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// What a grant assignment hands to its principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrantTarget {
    /// Membership in a role.
    Role {
        /// Granted role identifier.
        role_id: String,
    },
    /// One permission granted directly.
    Permission {
        /// Granted permission identifier.
        permission_id: String,
    },
}

impl GrantTarget {
    /// Returns the role or permission identifier.
    #[must_use]
    pub fn target_id(&self) -> &str {
        match self {
            Self::Role { role_id } => role_id.as_str(),
            Self::Permission { permission_id } => permission_id.as_str(),
        }
    }

    /// Returns a stable label for the target kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Role { .. } => "role",
            Self::Permission { .. } => "permission",
        }
    }
}

/// Assignment of a role or direct permission to a principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantAssignment {
    /// Stable grant identifier.
    pub grant_id: String,
    /// Principal receiving the grant.
    pub principal: String,
    /// Granted role or permission.
    pub target: GrantTarget,
    /// Actor that created the grant.
    pub granted_by: String,
    /// Creation timestamp.
    pub granted_at: DateTime<Utc>,
    /// Optional expiry timestamp.
    pub expires_at: Option<DateTime<Utc>>,
    /// Conditions replacing the permission defaults for direct grants.
    pub conditions: Option<Vec<PermissionCondition>>,
    /// Cleared on revoke or expiry sweep.
    pub is_active: bool,
    /// Justification captured at grant time.
    pub reason: Option<String>,
    /// Actor that revoked the grant.
    pub revoked_by: Option<String>,
    /// Revocation timestamp.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl GrantAssignment {
    /// Returns whether the grant is active and unexpired at `now`.
    #[must_use]
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }

    /// Returns whether the grant expired before `now` while still flagged active.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Returns a revoked copy.
    #[must_use]
    pub fn revoked(&self, revoked_by: &str, now: DateTime<Utc>) -> Self {
        let mut revoked = self.clone();
        revoked.is_active = false;
        revoked.revoked_by = Some(revoked_by.to_owned());
        revoked.revoked_at = Some(now);
        revoked
    }
}

fn validate_identifier(label: &str, value: &str) -> AppResult<()> {
    let is_valid = !value.is_empty()
        && value.chars().all(|character| {
            character.is_ascii_lowercase()
                || character.is_ascii_digit()
                || matches!(character, '_' | '-' | '.')
        });

    if !is_valid {
        return Err(AppError::Validation(format!(
            "{label} '{value}' must use lowercase letters, digits, '_', '-' or '.'"
        )));
    }

    Ok(())
}

fn normalize_parents(role_id: &str, inherits_from: Vec<String>) -> AppResult<Vec<String>> {
    let mut seen = BTreeSet::new();
    let mut parents = Vec::with_capacity(inherits_from.len());

    for parent in inherits_from {
        if parent == role_id {
            return Err(AppError::Validation(format!(
                "role '{role_id}' cannot inherit from itself"
            )));
        }

        if seen.insert(parent.clone()) {
            parents.push(parent);
        }
    }

    Ok(parents)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{
        GrantAssignment, GrantTarget, PermissionAction, RoleDefinition, RoleDefinitionInput,
        RoleLevel, permission_id,
    };

    fn role_input(role_id: &str, inherits_from: &[&str]) -> RoleDefinitionInput {
        RoleDefinitionInput {
            role_id: role_id.to_owned(),
            display_name: String::new(),
            description: String::new(),
            level: RoleLevel::Manager,
            permissions: vec![permission_id("production", PermissionAction::Delete)],
            inherits_from: inherits_from.iter().map(|value| (*value).to_owned()).collect(),
            is_system: false,
        }
    }

    #[test]
    fn permission_action_roundtrip_storage_value() {
        for action in PermissionAction::all() {
            let restored = action.as_str().parse::<PermissionAction>();
            assert!(matches!(restored, Ok(value) if value == *action));
        }
    }

    #[test]
    fn role_rejects_self_inheritance() {
        let result = RoleDefinition::new(role_input("manager", &["manager"]), Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn role_deduplicates_parents_in_order() {
        let role = RoleDefinition::new(
            role_input("admin", &["manager", "user", "manager"]),
            Utc::now(),
        );
        assert!(matches!(
            role,
            Ok(role) if role.inherits_from() == ["manager".to_owned(), "user".to_owned()]
        ));
    }

    #[test]
    fn role_rejects_uppercase_identifier() {
        let result = RoleDefinition::new(role_input("Manager", &[]), Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn revision_bumps_version_and_keeps_active_flag() {
        let now = Utc::now();
        let Ok(role) = RoleDefinition::new(role_input("manager", &[]), now) else {
            panic!("valid role");
        };
        let deactivated = role.deactivated(now);
        let Ok(revised) = deactivated.revised(role_input("manager", &["user"]), now) else {
            panic!("valid revision");
        };

        assert_eq!(revised.version(), 3);
        assert!(!revised.is_active());
    }

    #[test]
    fn expired_grant_is_not_effective() {
        let now = Utc::now();
        let grant = GrantAssignment {
            grant_id: "g-1".to_owned(),
            principal: "U1".to_owned(),
            target: GrantTarget::Role {
                role_id: "manager".to_owned(),
            },
            granted_by: "admin".to_owned(),
            granted_at: now - Duration::hours(2),
            expires_at: Some(now - Duration::minutes(1)),
            conditions: None,
            is_active: true,
            reason: None,
            revoked_by: None,
            revoked_at: None,
        };

        assert!(!grant.is_effective_at(now));
        assert!(grant.is_expired_at(now));
        assert!(!grant.revoked("admin", now).is_expired_at(now));
    }
}
