use chrono::Utc;

use shopfloor_core::{AppError, UserIdentity};
use shopfloor_domain::{
    AuditAction, AuditSeverity, PermissionAction, PermissionDefinitionInput, PermissionLevel,
    RoleDefinition, RoleDefinitionInput, RoleLevel,
};

use super::CatalogService;
use crate::access_ports::AssignGrantInput;
use crate::grant_service::GrantService;
use crate::permission_engine::{AccessRequest, DecisionSource};
use crate::role_graph::RoleIntegrityIssue;
use crate::test_support::{AccessHarness, grant, permission, role, role_input, role_target};

fn admin() -> UserIdentity {
    UserIdentity::new("admin", "Admin", None)
}

async fn setup() -> (AccessHarness, CatalogService, GrantService) {
    let harness = AccessHarness::new();
    harness
        .seed_permission(permission("security", PermissionAction::Manage))
        .await;
    harness
        .seed_role(role("security_admin", &["security:manage"], &[]))
        .await;
    harness
        .repository
        .put_grant(grant("admin", role_target("security_admin"), Utc::now()))
        .await;

    let catalog = CatalogService::new(
        harness.repositories.clone(),
        harness.cache.clone(),
        harness.engine.clone(),
        harness.sink.clone(),
    );
    let grants = GrantService::new(
        harness.repositories.clone(),
        harness.cache.clone(),
        harness.engine.clone(),
        harness.sink.clone(),
    );
    (harness, catalog, grants)
}

fn permission_input(resource: &str, action: PermissionAction) -> PermissionDefinitionInput {
    PermissionDefinitionInput {
        resource: resource.to_owned(),
        action,
        description: format!("{} {resource}", action.as_str()),
        category: "operations".to_owned(),
        level: PermissionLevel::Advanced,
        conditions: Vec::new(),
    }
}

async fn create_manager(catalog: &CatalogService) -> RoleDefinition {
    assert!(
        catalog
            .create_permission(
                &admin(),
                permission_input("production", PermissionAction::Delete)
            )
            .await
            .is_ok()
    );
    catalog
        .create_role(&admin(), role_input("manager", &["production:delete"], &[]))
        .await
        .unwrap_or_else(|_| unreachable!())
}

#[tokio::test]
async fn created_role_assigned_to_user_grants_through_role() {
    let (harness, catalog, grants) = setup().await;
    create_manager(&catalog).await;

    let assigned = grants
        .assign_role(
            &admin(),
            AssignGrantInput {
                principal: "u1".to_owned(),
                target_id: "manager".to_owned(),
                expires_at: None,
                reason: None,
                conditions: None,
            },
        )
        .await;
    assert!(assigned.is_ok());

    let decision = harness
        .engine
        .check(&AccessRequest::new("u1", "production", PermissionAction::Delete))
        .await;
    assert!(decision.granted);
    assert_eq!(decision.source, DecisionSource::Role);
    assert_eq!(decision.role_id.as_deref(), Some("manager"));
    assert_eq!(decision.permission_id.as_deref(), Some("production:delete"));
}

#[tokio::test]
async fn catalog_changes_are_audited_with_high_severity() {
    let (harness, catalog, _) = setup().await;
    create_manager(&catalog).await;

    let entries = harness.audit_entries().await;
    let actions: Vec<AuditAction> = entries.iter().map(|entry| entry.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::PermissionCreated, AuditAction::RoleCreated]
    );
    assert!(
        entries
            .iter()
            .all(|entry| entry.severity == AuditSeverity::High)
    );
}

#[tokio::test]
async fn duplicate_permission_conflicts() {
    let (_, catalog, _) = setup().await;

    let result = catalog
        .create_permission(&admin(), permission_input("security", PermissionAction::Manage))
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn role_with_unknown_references_is_rejected() {
    let (_, catalog, _) = setup().await;

    let unknown_permission = catalog
        .create_role(&admin(), role_input("ops", &["ghost:read"], &[]))
        .await;
    let unknown_parent = catalog
        .create_role(&admin(), role_input("ops", &[], &["ghost"]))
        .await;

    assert!(matches!(unknown_permission, Err(AppError::Validation(_))));
    assert!(matches!(unknown_parent, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn update_requires_current_version_and_refreshes_resolution() {
    let (harness, catalog, _) = setup().await;
    let manager = create_manager(&catalog).await;
    assert!(
        catalog
            .create_permission(&admin(), permission_input("costs", PermissionAction::Approve))
            .await
            .is_ok()
    );
    harness
        .repository
        .put_grant(grant("u1", role_target("manager"), Utc::now()))
        .await;
    let request = AccessRequest::new("u1", "costs", PermissionAction::Approve);
    assert!(!harness.engine.check(&request).await.granted);

    let revision = role_input("manager", &["production:delete", "costs:approve"], &[]);
    let stale = catalog
        .update_role(&admin(), revision.clone(), manager.version() + 1)
        .await;
    assert!(matches!(stale, Err(AppError::Conflict(_))));

    let updated = catalog
        .update_role(&admin(), revision, manager.version())
        .await;
    assert!(matches!(updated, Ok(ref role) if role.version() == manager.version() + 1));
    assert!(harness.engine.check(&request).await.granted);
}

#[tokio::test]
async fn update_closing_a_cycle_is_rejected() {
    let (_, catalog, _) = setup().await;
    let base = catalog
        .create_role(&admin(), role_input("base", &[], &[]))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(
        catalog
            .create_role(&admin(), role_input("derived", &[], &["base"]))
            .await
            .is_ok()
    );

    let result = catalog
        .update_role(
            &admin(),
            role_input("base", &[], &["derived"]),
            base.version(),
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn deactivation_survives_transient_audit_failures() {
    let (harness, catalog, _) = setup().await;
    create_manager(&catalog).await;
    harness
        .repository
        .put_grant(grant("u1", role_target("manager"), Utc::now()))
        .await;
    assert!(harness.sink.flush().await.is_ok());
    harness.audit_store.fail_next_puts(2);

    let result = catalog.deactivate_role(&admin(), "manager").await;

    assert!(matches!(result, Ok(ref role) if !role.is_active()));
    let decision = harness
        .engine
        .check(&AccessRequest::new("u1", "production", PermissionAction::Delete))
        .await;
    assert!(!decision.granted);

    let entries = harness.audit_entries().await;
    assert!(entries.iter().any(|entry| {
        entry.action == AuditAction::RoleDeactivated && entry.severity == AuditSeverity::Critical
    }));
}

#[tokio::test]
async fn deactivation_fails_when_audit_retries_are_exhausted() {
    let (harness, catalog, _) = setup().await;
    create_manager(&catalog).await;
    assert!(harness.sink.flush().await.is_ok());
    harness.audit_store.fail_next_puts(10);

    let result = catalog.deactivate_role(&admin(), "manager").await;

    assert!(matches!(result, Err(AppError::AuditDurability(_))));
    let roles = catalog
        .list_roles(&admin())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(
        roles
            .iter()
            .any(|role| role.role_id() == "manager" && role.is_active())
    );
}

#[tokio::test]
async fn system_roles_cannot_be_deactivated() {
    let (harness, catalog, _) = setup().await;
    let system_role = RoleDefinition::new(
        RoleDefinitionInput {
            role_id: "system".to_owned(),
            display_name: "System".to_owned(),
            description: String::new(),
            level: RoleLevel::System,
            permissions: Vec::new(),
            inherits_from: Vec::new(),
            is_system: true,
        },
        Utc::now(),
    )
    .unwrap_or_else(|_| unreachable!());
    harness.seed_role(system_role).await;

    let result = catalog.deactivate_role(&admin(), "system").await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn integrity_report_surfaces_dangling_references() {
    let (harness, catalog, _) = setup().await;
    harness
        .seed_role(role("legacy", &["ghost:read"], &["retired"]))
        .await;

    let issues = catalog
        .integrity_report(&admin())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        issues,
        vec![
            RoleIntegrityIssue::UnknownPermission {
                role_id: "legacy".to_owned(),
                permission_id: "ghost:read".to_owned(),
            },
            RoleIntegrityIssue::UnknownParent {
                role_id: "legacy".to_owned(),
                parent_id: "retired".to_owned(),
            },
        ]
    );
}

#[tokio::test]
async fn role_permissions_include_inherited_entries() {
    let (_, catalog, _) = setup().await;
    create_manager(&catalog).await;
    assert!(
        catalog
            .create_role(&admin(), role_input("plant_admin", &[], &["manager"]))
            .await
            .is_ok()
    );

    let resolved = catalog
        .role_permissions(&admin(), "plant_admin")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].role_id, "manager");
}
