use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shopfloor_core::AppError;

macro_rules! storage_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($(#[$variant_meta:meta])* $variant:ident => $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$variant_meta])* $variant,)+
        }

        impl $name {
            /// Returns a stable storage value.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value,)+
                }
            }

            /// Returns all known values.
            #[must_use]
            pub fn all() -> &'static [Self] {
                &[$(Self::$variant,)+]
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(AppError::Validation(format!(
                        concat!("unknown ", $label, " '{}'"),
                        value
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str(self.as_str())
            }
        }
    };
}

storage_enum! {
    /// Stable audit actions emitted by the platform.
    AuditAction, "audit action" {
        /// Successful sign-in.
        Login => "login",
        /// Sign-out.
        Logout => "logout",
        /// Rejected sign-in attempt.
        LoginFailed => "login_failed",
        /// Password change.
        PasswordChanged => "password_changed",
        /// Business record created.
        RecordCreated => "record_created",
        /// Business record read.
        RecordRead => "record_read",
        /// Business record updated.
        RecordUpdated => "record_updated",
        /// Business record deleted.
        RecordDeleted => "record_deleted",
        /// Business data exported.
        DataExported => "data_exported",
        /// Business data imported.
        DataImported => "data_imported",
        /// Permission check denied.
        AccessDenied => "access_denied",
        /// Permission added to the catalog.
        PermissionCreated => "permission_created",
        /// Permission granted directly to a principal.
        PermissionGranted => "permission_granted",
        /// Direct permission revoked from a principal.
        PermissionRevoked => "permission_revoked",
        /// Role created.
        RoleCreated => "role_created",
        /// Role attributes replaced.
        RoleUpdated => "role_updated",
        /// Role deactivated.
        RoleDeactivated => "role_deactivated",
        /// Role assigned to a principal.
        RoleAssigned => "role_assigned",
        /// Role revoked from a principal.
        RoleRevoked => "role_revoked",
        /// Expired grants deactivated by a sweep.
        GrantsExpired => "grants_expired",
        /// Audit log exported.
        AuditExported => "audit_exported",
        /// Audit log entries purged.
        AuditPurged => "audit_purged",
        /// Platform setting changed.
        SettingsChanged => "settings_changed",
    }
}

storage_enum! {
    /// Audit event grouping.
    AuditCategory, "audit category" {
        /// Sign-in and session events.
        Authentication => "authentication",
        /// Permission decisions.
        Authorization => "authorization",
        /// Business data changes.
        Data => "data",
        /// Security administration.
        Security => "security",
        /// Platform operations.
        System => "system",
        /// User account administration.
        UserManagement => "user_management",
        /// Configuration changes.
        Configuration => "configuration",
    }
}

storage_enum! {
    /// Audit event severity.
    AuditSeverity, "audit severity" {
        /// Routine event.
        Low => "low",
        /// Noteworthy event.
        Medium => "medium",
        /// Sensitive event.
        High => "high",
        /// Event that must never be lost.
        Critical => "critical",
    }
}

storage_enum! {
    /// Result of the audited action.
    AuditOutcome, "audit outcome" {
        /// Action completed.
        Success => "success",
        /// Action failed or was rejected.
        Failure => "failure",
        /// Action completed for a subset of targets.
        Partial => "partial",
    }
}

/// Identity captured on every audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditActor {
    /// Stable subject identifier.
    pub subject: String,
    /// Email, when known.
    pub email: Option<String>,
    /// Display name, when known.
    pub name: Option<String>,
}

/// Before/after snapshot of an audited change.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuditChanges {
    /// State before the change.
    pub before: Option<Value>,
    /// State after the change.
    pub after: Option<Value>,
}

/// Recorded, immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Stable entry identifier.
    pub entry_id: String,
    /// Store-assigned insertion sequence, strictly increasing.
    pub sequence: u64,
    /// Actor that performed the action.
    pub actor: AuditActor,
    /// Action taken.
    pub action: AuditAction,
    /// Target resource label.
    pub resource: String,
    /// Target resource identifier.
    pub resource_id: Option<String>,
    /// Event grouping.
    pub category: AuditCategory,
    /// Event severity.
    pub severity: AuditSeverity,
    /// Action result.
    pub outcome: AuditOutcome,
    /// Event timestamp.
    pub occurred_at: DateTime<Utc>,
    /// Free-text description.
    pub description: String,
    /// Optional change snapshot.
    pub changes: Option<AuditChanges>,
    /// Network origin of the request.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Session identifier.
    pub session_id: Option<String>,
    /// Correlation identifier linking related events.
    pub correlation_id: Option<String>,
}

impl AuditLogEntry {
    /// Returns whether the entry counts as a security-relevant event.
    #[must_use]
    pub fn is_security_event(&self) -> bool {
        matches!(
            self.category,
            AuditCategory::Security | AuditCategory::Authentication
        )
    }

    /// Returns whether the entry records a failed authentication attempt.
    #[must_use]
    pub fn is_failed_authentication(&self) -> bool {
        self.action == AuditAction::LoginFailed
            || (self.category == AuditCategory::Authentication
                && self.outcome == AuditOutcome::Failure)
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditAction, AuditSeverity};

    #[test]
    fn audit_action_roundtrip_storage_value() {
        for action in AuditAction::all() {
            let restored = action.as_str().parse::<AuditAction>();
            assert!(matches!(restored, Ok(value) if value == *action));
        }
    }

    #[test]
    fn unknown_severity_is_rejected() {
        assert!("urgent".parse::<AuditSeverity>().is_err());
    }

    #[test]
    fn severity_orders_by_impact() {
        assert!(AuditSeverity::Critical > AuditSeverity::High);
        assert!(AuditSeverity::Low < AuditSeverity::Medium);
    }
}
