use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shopfloor_core::AppResult;
use shopfloor_domain::{GrantAssignment, PermissionCondition};

/// Input payload shared by role and direct permission assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignGrantInput {
    /// Principal receiving the grant.
    pub principal: String,
    /// Role identifier or permission identifier.
    pub target_id: String,
    /// Optional expiry timestamp; must be in the future.
    pub expires_at: Option<DateTime<Utc>>,
    /// Optional justification.
    pub reason: Option<String>,
    /// Optional conditions replacing the permission defaults.
    pub conditions: Option<Vec<PermissionCondition>>,
}

/// Repository port for grant assignments.
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Lists every grant of a principal, including inactive ones.
    async fn list_grants_for_principal(&self, principal: &str)
    -> AppResult<Vec<GrantAssignment>>;

    /// Inserts a new grant.
    ///
    /// Fails with `AppError::Conflict` when the principal already holds an
    /// active grant of the same target, so concurrent assignments of one
    /// target store at most one active grant.
    async fn insert_grant(&self, grant: GrantAssignment) -> AppResult<()>;

    /// Deactivates a grant if it is still active.
    ///
    /// Returns `false` when the grant was already inactive, which makes
    /// concurrent revocations and sweeps idempotent.
    async fn deactivate_grant(
        &self,
        grant_id: &str,
        revoked_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Lists grants still flagged active whose expiry is at or before `now`.
    async fn list_expired_active_grants(&self, now: DateTime<Utc>)
    -> AppResult<Vec<GrantAssignment>>;
}
