mod defaults;


use std::sync::Arc;

use chrono::Utc;

use shopfloor_core::{AppError, AppResult, UserIdentity};
use shopfloor_domain::{AuditAction, GrantTarget, PermissionDefinition, RoleDefinition};

use crate::access_cache::AccessCache;
use crate::access_ports::{AccessRepositories, AssignGrantInput};
use crate::grant_service::GrantService;

pub use defaults::SUPER_ADMIN_ROLE;

/// What one bootstrap run created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Permissions inserted by this run.
    pub permissions_created: usize,
    /// Roles inserted by this run.
    pub roles_created: usize,
    /// Whether the bootstrap administrator received the super admin role.
    pub admin_granted: bool,
}

/// Deployment-time seeding of the default catalog and role ladder.
///
/// Existing definitions are never overwritten, so running it again is a no-op.
#[derive(Clone)]
pub struct AccessBootstrap {
    repositories: AccessRepositories,
    cache: Arc<AccessCache>,
    grants: GrantService,
}

impl AccessBootstrap {
    /// Creates a bootstrap step writing through the given grant service.
    #[must_use]
    pub fn new(
        repositories: AccessRepositories,
        cache: Arc<AccessCache>,
        grants: GrantService,
    ) -> Self {
        Self {
            repositories,
            cache,
            grants,
        }
    }

    /// Inserts missing default permissions and roles, then optionally grants
    /// the super admin role to `bootstrap_admin`.
    pub async fn seed_defaults(&self, bootstrap_admin: Option<&str>) -> AppResult<BootstrapReport> {
        let mut report = BootstrapReport::default();

        for input in defaults::permissions() {
            let permission = PermissionDefinition::new(input)?;
            let permission_id = permission.permission_id();
            if self
                .repositories
                .catalog
                .find_permission(permission_id.as_str())
                .await?
                .is_none()
            {
                self.repositories.catalog.insert_permission(permission).await?;
                report.permissions_created += 1;
            }
        }

        let now = Utc::now();
        for input in defaults::roles() {
            if self
                .repositories
                .roles
                .find_role(input.role_id.as_str())
                .await?
                .is_none()
            {
                self.repositories
                    .roles
                    .insert_role(RoleDefinition::new(input, now)?)
                    .await?;
                report.roles_created += 1;
            }
        }

        if report.permissions_created > 0 || report.roles_created > 0 {
            self.cache.invalidate_definitions().await;
        }

        if let Some(subject) = bootstrap_admin.map(str::trim).filter(|subject| !subject.is_empty()) {
            report.admin_granted = self.grant_super_admin(subject).await?;
        }

        tracing::info!(
            permissions_created = report.permissions_created,
            roles_created = report.roles_created,
            admin_granted = report.admin_granted,
            "access bootstrap finished"
        );

        Ok(report)
    }

    async fn grant_super_admin(&self, subject: &str) -> AppResult<bool> {
        let input = AssignGrantInput {
            principal: subject.to_owned(),
            target_id: SUPER_ADMIN_ROLE.to_owned(),
            expires_at: None,
            reason: Some("deployment bootstrap".to_owned()),
            conditions: None,
        };
        let target = GrantTarget::Role {
            role_id: SUPER_ADMIN_ROLE.to_owned(),
        };

        match self
            .grants
            .record_grant(&UserIdentity::system(), input, target, AuditAction::RoleAssigned)
            .await
        {
            Ok(_) => Ok(true),
            Err(AppError::Conflict(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }
}
