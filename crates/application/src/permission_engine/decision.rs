use shopfloor_core::UserIdentity;
use shopfloor_domain::{AccessContext, GrantAssignment, PermissionAction, permission_id};

use crate::role_graph::ResolvedPermission;

/// One permission check.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRequest {
    /// Principal the check is evaluated for, with its request origin.
    pub principal: UserIdentity,
    /// Target resource.
    pub resource: String,
    /// Requested action.
    pub action: PermissionAction,
    /// Caller-supplied values conditions are evaluated against.
    pub context: AccessContext,
    /// Subject that asked for the check when it differs from the principal.
    pub requested_by: Option<String>,
}

impl AccessRequest {
    /// Creates a request for a bare principal identifier with an empty context.
    #[must_use]
    pub fn new(
        principal: impl Into<String>,
        resource: impl Into<String>,
        action: PermissionAction,
    ) -> Self {
        let subject = principal.into();
        Self::for_identity(
            UserIdentity::new(subject.clone(), subject, None),
            resource,
            action,
        )
    }

    /// Creates a request for an authenticated identity with an empty context.
    #[must_use]
    pub fn for_identity(
        principal: UserIdentity,
        resource: impl Into<String>,
        action: PermissionAction,
    ) -> Self {
        Self {
            principal,
            resource: resource.into(),
            action,
            context: AccessContext::new(),
            requested_by: None,
        }
    }

    /// Replaces the condition context.
    #[must_use]
    pub fn with_context(mut self, context: AccessContext) -> Self {
        self.context = context;
        self
    }

    /// Records the subject that asked on the principal's behalf.
    #[must_use]
    pub fn requested_by(mut self, subject: impl Into<String>) -> Self {
        self.requested_by = Some(subject.into());
        self
    }

    /// Returns the `resource:action` identifier being requested.
    #[must_use]
    pub fn permission_id(&self) -> String {
        permission_id(self.resource.as_str(), self.action)
    }
}

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// A direct permission grant.
    Direct,
    /// A role grant, possibly through inheritance.
    Role,
    /// No grant applied; the engine denied.
    System,
}

impl DecisionSource {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Role => "role",
            Self::System => "system",
        }
    }
}

/// Why a decision denied access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    /// Resolution completed and nothing granted the request.
    NoMatchingGrant,
    /// The stores could not be read, so nothing could be proven.
    Indeterminate,
    /// The caller deadline elapsed before resolution completed.
    TimedOut,
}

impl DenialKind {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoMatchingGrant => "no_matching_grant",
            Self::Indeterminate => "indeterminate",
            Self::TimedOut => "timed_out",
        }
    }

    fn public_reason(self) -> &'static str {
        match self {
            Self::NoMatchingGrant => "no active grant allows this action",
            Self::Indeterminate => "access could not be determined",
            Self::TimedOut => "access check did not complete in time",
        }
    }
}

/// Outcome of a permission check with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    /// Whether access is granted.
    pub granted: bool,
    /// Human-readable reason; never reveals whether the resource exists.
    pub reason: String,
    /// Decision provenance.
    pub source: DecisionSource,
    /// Assigned role that granted access.
    pub role_id: Option<String>,
    /// Permission that granted access.
    pub permission_id: Option<String>,
    /// Grant that granted access.
    pub grant_id: Option<String>,
    /// Denial classification, set on every denial.
    pub denial: Option<DenialKind>,
}

impl AccessDecision {
    pub(crate) fn direct(grant: &GrantAssignment, permission_id: &str) -> Self {
        Self {
            granted: true,
            reason: format!("granted directly by permission '{permission_id}'"),
            source: DecisionSource::Direct,
            role_id: None,
            permission_id: Some(permission_id.to_owned()),
            grant_id: Some(grant.grant_id.clone()),
            denial: None,
        }
    }

    pub(crate) fn via_role(
        grant: &GrantAssignment,
        role_id: &str,
        resolved: &ResolvedPermission,
    ) -> Self {
        let permission_id = resolved.permission.permission_id();
        let reason = if resolved.role_id == role_id {
            format!("granted by role '{role_id}' through permission '{permission_id}'")
        } else {
            format!(
                "granted by role '{role_id}' inheriting '{}' through permission '{permission_id}'",
                resolved.role_id
            )
        };

        Self {
            granted: true,
            reason,
            source: DecisionSource::Role,
            role_id: Some(role_id.to_owned()),
            permission_id: Some(permission_id),
            grant_id: Some(grant.grant_id.clone()),
            denial: None,
        }
    }

    pub(crate) fn denied(kind: DenialKind) -> Self {
        Self {
            granted: false,
            reason: kind.public_reason().to_owned(),
            source: DecisionSource::System,
            role_id: None,
            permission_id: None,
            grant_id: None,
            denial: Some(kind),
        }
    }
}
