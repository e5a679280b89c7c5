use chrono::{Duration as ChronoDuration, Utc};

use shopfloor_core::{AppError, UserIdentity};
use shopfloor_domain::{
    AccessContext, AuditAction, AuditCategory, AuditOutcome, AuditSeverity, ConditionOperator,
    ConditionValue,
    PermissionAction, PermissionCondition,
};

use super::GrantService;
use crate::access_ports::AssignGrantInput;
use crate::permission_engine::AccessRequest;
use crate::test_support::{
    AccessHarness, grant, permission, permission_target, role, role_target,
};

fn admin() -> UserIdentity {
    UserIdentity::new("admin", "Admin", Some("admin@shopfloor.test".to_owned()))
}

fn assign_input(principal: &str, target_id: &str) -> AssignGrantInput {
    AssignGrantInput {
        principal: principal.to_owned(),
        target_id: target_id.to_owned(),
        expires_at: None,
        reason: Some("shift lead".to_owned()),
        conditions: None,
    }
}

async fn setup() -> (AccessHarness, GrantService) {
    let harness = AccessHarness::new();
    harness
        .seed_permission(permission("security", PermissionAction::Manage))
        .await;
    harness
        .seed_permission(permission("production", PermissionAction::Delete))
        .await;
    harness
        .seed_role(role("security_admin", &["security:manage"], &[]))
        .await;
    harness
        .seed_role(role("manager", &["production:delete"], &[]))
        .await;
    harness
        .repository
        .put_grant(grant("admin", role_target("security_admin"), Utc::now()))
        .await;

    let service = GrantService::new(
        harness.repositories.clone(),
        harness.cache.clone(),
        harness.engine.clone(),
        harness.sink.clone(),
    );
    (harness, service)
}

fn delete_production(principal: &str) -> AccessRequest {
    AccessRequest::new(principal, "production", PermissionAction::Delete)
}

#[tokio::test]
async fn assigned_role_grants_and_revoke_is_immediately_effective() {
    let (harness, service) = setup().await;
    let request = delete_production("u1");
    assert!(!harness.engine.check(&request).await.granted);

    let assigned = service
        .assign_role(&admin(), assign_input("u1", "manager"))
        .await;
    assert!(assigned.is_ok());
    assert!(harness.engine.check(&request).await.granted);

    let revoked = service.revoke(&admin(), "u1", "manager").await;
    assert!(matches!(revoked, Ok(ref grants) if grants.len() == 1));
    assert!(!harness.engine.check(&request).await.granted);
}

#[tokio::test]
async fn assignment_requires_security_manage() {
    let (_, service) = setup().await;

    let result = service
        .assign_role(
            &UserIdentity::new("mallory", "Mallory", None),
            assign_input("mallory", "manager"),
        )
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn assignment_and_revoke_are_audited_with_snapshots() {
    let (harness, service) = setup().await;
    assert!(
        service
            .assign_role(&admin(), assign_input("u1", "manager"))
            .await
            .is_ok()
    );
    assert!(service.revoke(&admin(), "u1", "manager").await.is_ok());

    let entries = harness.audit_entries().await;
    let actions: Vec<AuditAction> = entries.iter().map(|entry| entry.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::RoleAssigned, AuditAction::RoleRevoked]
    );

    for entry in &entries {
        assert_eq!(entry.category, AuditCategory::Security);
        assert_eq!(entry.severity, AuditSeverity::Medium);
        assert_eq!(entry.actor.subject, "admin");
        assert!(entry.changes.is_some());
    }

    let assigned_after = entries[0]
        .changes
        .as_ref()
        .and_then(|changes| changes.after.as_ref())
        .map(|after| after["active_grants"].clone());
    assert_eq!(
        assigned_after,
        Some(serde_json::json!(["role:manager"]))
    );
}

#[tokio::test]
async fn past_expiry_is_rejected() {
    let (_, service) = setup().await;
    let mut input = assign_input("u1", "manager");
    input.expires_at = Some(Utc::now() - ChronoDuration::minutes(1));

    let result = service.assign_role(&admin(), input).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn future_expiry_grants_until_it_passes() {
    let (harness, service) = setup().await;
    let mut input = assign_input("u1", "manager");
    input.expires_at = Some(Utc::now() + ChronoDuration::hours(8));

    assert!(service.assign_role(&admin(), input).await.is_ok());
    assert!(harness.engine.check(&delete_production("u1")).await.granted);
}

#[tokio::test]
async fn role_grants_reject_condition_overrides() {
    let (_, service) = setup().await;
    let mut input = assign_input("u1", "manager");
    input.conditions = Some(Vec::new());

    let result = service.assign_role(&admin(), input).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn duplicate_active_assignment_conflicts() {
    let (_, service) = setup().await;
    assert!(
        service
            .assign_role(&admin(), assign_input("u1", "manager"))
            .await
            .is_ok()
    );

    let result = service
        .assign_role(&admin(), assign_input("u1", "manager"))
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn unknown_targets_are_not_found() {
    let (_, service) = setup().await;

    let role = service
        .assign_role(&admin(), assign_input("u1", "ghost"))
        .await;
    let permission = service
        .assign_permission(&admin(), assign_input("u1", "ghost:read"))
        .await;
    let revoke = service.revoke(&admin(), "u1", "manager").await;

    assert!(matches!(role, Err(AppError::NotFound(_))));
    assert!(matches!(permission, Err(AppError::NotFound(_))));
    assert!(matches!(revoke, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn direct_grant_with_condition_is_gated_by_context() {
    let (harness, service) = setup().await;
    let mut input = assign_input("u2", "production:delete");
    input.conditions = Some(vec![
        PermissionCondition::new(
            "ownerId",
            ConditionOperator::Equals,
            ConditionValue::from("U2"),
        )
        .unwrap_or_else(|_| unreachable!()),
    ]);
    assert!(service.assign_permission(&admin(), input).await.is_ok());

    let own = AccessContext::from([("ownerId".to_owned(), ConditionValue::from("U2"))]);
    let foreign = AccessContext::from([("ownerId".to_owned(), ConditionValue::from("U3"))]);

    assert!(
        harness
            .engine
            .check(&delete_production("u2").with_context(own))
            .await
            .granted
    );
    assert!(
        !harness
            .engine
            .check(&delete_production("u2").with_context(foreign))
            .await
            .granted
    );
}

#[tokio::test]
async fn sweep_deactivates_expired_grants_once() {
    let (harness, service) = setup().await;
    let past = Utc::now() - ChronoDuration::hours(1);
    let mut expired = grant(
        "u1",
        permission_target("production:delete"),
        past - ChronoDuration::days(1),
    );
    expired.expires_at = Some(past);
    harness.repository.put_grant(expired).await;

    let first = service.sweep_expired_grants().await;
    let second = service.sweep_expired_grants().await;

    assert!(matches!(first, Ok(1)));
    assert!(matches!(second, Ok(0)));
    let stored = harness.repository.stored_grants().await;
    assert!(
        stored
            .iter()
            .filter(|grant| grant.principal == "u1")
            .all(|grant| !grant.is_active)
    );

    let entries = harness.audit_entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::GrantsExpired);
    assert_eq!(entries[0].actor.subject, "system");
}

#[tokio::test]
async fn principals_list_own_grants_but_not_others() {
    let (_, service) = setup().await;
    assert!(
        service
            .assign_role(&admin(), assign_input("u1", "manager"))
            .await
            .is_ok()
    );
    let user = UserIdentity::new("u1", "User One", None);

    let own = service.active_grants_for(&user, "u1").await;
    let foreign = service.active_grants_for(&user, "admin").await;

    assert!(matches!(own, Ok(ref grants) if grants.len() == 1));
    assert!(matches!(foreign, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn interrupted_revoke_still_audits_deactivated_grants() {
    let (harness, service) = setup().await;
    let now = Utc::now();
    let mut lapsed = grant("u9", role_target("manager"), now - ChronoDuration::days(2));
    lapsed.grant_id = "u9-manager-lapsed".to_owned();
    lapsed.expires_at = Some(now - ChronoDuration::days(1));
    let mut live = grant("u9", role_target("manager"), now - ChronoDuration::hours(1));
    live.grant_id = "u9-manager-live".to_owned();
    harness.repository.put_grant(lapsed).await;
    harness.repository.put_grant(live).await;
    harness.repository.fail_deactivations_after(1).await;

    let result = service.revoke(&admin(), "u9", "manager").await;

    assert!(matches!(result, Err(AppError::Unavailable(_))));
    let deactivated = harness
        .repository
        .stored_grants()
        .await
        .into_iter()
        .filter(|grant| grant.principal == "u9" && !grant.is_active)
        .count();
    assert_eq!(deactivated, 1);

    let revocations: Vec<_> = harness
        .audit_entries()
        .await
        .into_iter()
        .filter(|entry| entry.action == AuditAction::RoleRevoked)
        .collect();
    assert_eq!(revocations.len(), 1);
    assert_eq!(revocations[0].outcome, AuditOutcome::Partial);
    assert_eq!(revocations[0].resource_id.as_deref(), Some("u9:manager"));
}

#[tokio::test]
async fn revoke_failing_before_any_change_is_not_audited() {
    let (harness, service) = setup().await;
    assert!(
        service
            .assign_role(&admin(), assign_input("u1", "manager"))
            .await
            .is_ok()
    );
    harness.repository.fail_deactivations_after(0).await;

    let result = service.revoke(&admin(), "u1", "manager").await;

    assert!(matches!(result, Err(AppError::Unavailable(_))));
    let entries = harness.audit_entries().await;
    assert!(
        entries
            .iter()
            .all(|entry| entry.action != AuditAction::RoleRevoked)
    );
}

#[tokio::test]
async fn interrupted_sweep_audits_what_it_expired() {
    let (harness, service) = setup().await;
    let past = Utc::now() - ChronoDuration::hours(1);
    for principal in ["u1", "u2"] {
        let mut expired = grant(
            principal,
            permission_target("production:delete"),
            past - ChronoDuration::days(1),
        );
        expired.expires_at = Some(past);
        harness.repository.put_grant(expired).await;
    }
    harness.repository.fail_deactivations_after(1).await;

    let result = service.sweep_expired_grants().await;

    assert!(matches!(result, Err(AppError::Unavailable(_))));
    let entries = harness.audit_entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::GrantsExpired);
    assert_eq!(entries[0].outcome, AuditOutcome::Partial);
}

#[tokio::test]
async fn concurrent_assignments_of_one_role_store_a_single_grant() {
    let (harness, service) = setup().await;
    let actor = admin();

    let (first, second) = tokio::join!(
        service.assign_role(&actor, assign_input("u4", "manager")),
        service.assign_role(&actor, assign_input("u4", "manager")),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|result| matches!(result, Err(AppError::Conflict(_))))
    );
    let active = harness
        .repository
        .stored_grants()
        .await
        .into_iter()
        .filter(|grant| grant.principal == "u4" && grant.is_active)
        .count();
    assert_eq!(active, 1);
}

#[tokio::test]
async fn reassignment_retires_a_lapsed_grant_of_the_same_role() {
    let (harness, service) = setup().await;
    let past = Utc::now() - ChronoDuration::hours(1);
    let mut lapsed = grant("u5", role_target("manager"), past - ChronoDuration::days(1));
    lapsed.expires_at = Some(past);
    harness.repository.put_grant(lapsed).await;

    let assigned = service
        .assign_role(&admin(), assign_input("u5", "manager"))
        .await;

    assert!(assigned.is_ok());
    let grants = harness.repository.stored_grants().await;
    let active: Vec<_> = grants
        .iter()
        .filter(|grant| grant.principal == "u5" && grant.is_active)
        .collect();
    assert_eq!(active.len(), 1);
    assert!(active[0].expires_at.is_none());

    let actions: Vec<AuditAction> = harness
        .audit_entries()
        .await
        .iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(
        actions,
        vec![AuditAction::GrantsExpired, AuditAction::RoleAssigned]
    );
}
