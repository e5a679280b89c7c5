use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use shopfloor_core::{AppError, UserIdentity};
use shopfloor_domain::{
    AccessContext, AuditAction, AuditCategory, AuditOutcome, AuditSeverity, ConditionOperator,
    ConditionValue, PermissionAction, PermissionCondition,
};

use super::{AccessRequest, DecisionSource, DenialKind};
use crate::access_ports::GrantRepository;
use crate::test_support::{
    AccessHarness, conditional_permission, grant, permission, permission_target, role,
    role_target,
};

fn owner_condition(owner: &str) -> PermissionCondition {
    PermissionCondition::new("ownerId", ConditionOperator::Equals, ConditionValue::from(owner))
        .unwrap_or_else(|_| unreachable!())
}

fn owner_context(owner: &str) -> AccessContext {
    AccessContext::from([("ownerId".to_owned(), ConditionValue::from(owner))])
}

async fn seed_manager_role(harness: &AccessHarness) {
    harness
        .seed_permission(permission("production", PermissionAction::Delete))
        .await;
    harness
        .seed_role(role("manager", &["production:delete"], &[]))
        .await;
}

#[tokio::test]
async fn principal_without_grants_is_denied_without_definition_lookups() {
    let harness = AccessHarness::new();
    seed_manager_role(&harness).await;

    for action in PermissionAction::all() {
        let decision = harness
            .engine
            .check(&AccessRequest::new("nobody", "production", *action))
            .await;
        assert!(!decision.granted);
        assert_eq!(decision.source, DecisionSource::System);
        assert_eq!(decision.denial, Some(DenialKind::NoMatchingGrant));
    }

    assert_eq!(harness.repository.definition_reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn every_denial_is_audited_as_security_event() {
    let harness = AccessHarness::new();

    let decision = harness
        .engine
        .check(&AccessRequest::new("u1", "production", PermissionAction::Delete))
        .await;
    assert!(!decision.granted);

    let entries = harness.audit_entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::AccessDenied);
    assert_eq!(entries[0].category, AuditCategory::Security);
    assert_eq!(entries[0].severity, AuditSeverity::Medium);
    assert_eq!(entries[0].outcome, AuditOutcome::Failure);
    assert_eq!(entries[0].actor.subject, "u1");
    assert_eq!(entries[0].resource_id.as_deref(), Some("production:delete"));
    assert!(entries[0].changes.is_none());
}

#[tokio::test]
async fn denial_on_behalf_of_another_principal_names_the_caller() {
    let harness = AccessHarness::new();

    let decision = harness
        .engine
        .check(
            &AccessRequest::new("u1", "production", PermissionAction::Delete)
                .requested_by("supervisor"),
        )
        .await;
    assert!(!decision.granted);

    let entries = harness.audit_entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actor.subject, "u1");
    let recorded = entries[0]
        .changes
        .as_ref()
        .and_then(|changes| changes.after.as_ref())
        .and_then(|after| after.get("requested_by"))
        .and_then(|value| value.as_str());
    assert_eq!(recorded, Some("supervisor"));
}

#[tokio::test]
async fn role_grant_allows_matching_permission() {
    let harness = AccessHarness::new();
    seed_manager_role(&harness).await;
    harness
        .repository
        .put_grant(grant("u1", role_target("manager"), Utc::now()))
        .await;

    let decision = harness
        .engine
        .check(&AccessRequest::new("u1", "production", PermissionAction::Delete))
        .await;

    assert!(decision.granted);
    assert_eq!(decision.source, DecisionSource::Role);
    assert_eq!(decision.role_id.as_deref(), Some("manager"));
    assert_eq!(decision.permission_id.as_deref(), Some("production:delete"));
    assert!(harness.audit_entries().await.is_empty());
}

#[tokio::test]
async fn direct_grant_takes_precedence_over_role() {
    let harness = AccessHarness::new();
    seed_manager_role(&harness).await;
    let now = Utc::now();
    harness
        .repository
        .put_grant(grant("u1", role_target("manager"), now - ChronoDuration::hours(1)))
        .await;
    harness
        .repository
        .put_grant(grant("u1", permission_target("production:delete"), now))
        .await;

    let decision = harness
        .engine
        .check(&AccessRequest::new("u1", "production", PermissionAction::Delete))
        .await;

    assert!(decision.granted);
    assert_eq!(decision.source, DecisionSource::Direct);
    assert_eq!(decision.role_id, None);
}

#[tokio::test]
async fn expired_grants_never_grant() {
    let harness = AccessHarness::new();
    seed_manager_role(&harness).await;
    let past = Utc::now() - ChronoDuration::minutes(5);

    let mut expired_role = grant("u1", role_target("manager"), past - ChronoDuration::days(1));
    expired_role.expires_at = Some(past);
    let mut expired_direct = grant(
        "u1",
        permission_target("production:delete"),
        past - ChronoDuration::days(1),
    );
    expired_direct.expires_at = Some(past);
    harness.repository.put_grant(expired_role).await;
    harness.repository.put_grant(expired_direct).await;

    let decision = harness
        .engine
        .check(&AccessRequest::new("u1", "production", PermissionAction::Delete))
        .await;

    assert!(!decision.granted);
    assert_eq!(decision.denial, Some(DenialKind::NoMatchingGrant));
}

#[tokio::test]
async fn direct_grant_condition_override_is_evaluated() {
    let harness = AccessHarness::new();
    harness
        .seed_permission(permission("production", PermissionAction::Update))
        .await;
    let mut direct = grant("u2", permission_target("production:update"), Utc::now());
    direct.conditions = Some(vec![owner_condition("U2")]);
    harness.repository.put_grant(direct).await;

    let request = AccessRequest::new("u2", "production", PermissionAction::Update);
    let own = harness
        .engine
        .check(&request.clone().with_context(owner_context("U2")))
        .await;
    let foreign = harness
        .engine
        .check(&request.with_context(owner_context("U3")))
        .await;

    assert!(own.granted);
    assert_eq!(own.source, DecisionSource::Direct);
    assert!(!foreign.granted);
}

#[tokio::test]
async fn permission_default_conditions_apply_without_override() {
    let harness = AccessHarness::new();
    harness
        .seed_permission(conditional_permission(
            "costs",
            PermissionAction::Approve,
            vec![owner_condition("U2")],
        ))
        .await;
    harness
        .repository
        .put_grant(grant("u2", permission_target("costs:approve"), Utc::now()))
        .await;

    let request = AccessRequest::new("u2", "costs", PermissionAction::Approve);
    let missing_field = harness.engine.check(&request).await;
    let matching = harness
        .engine
        .check(&request.with_context(owner_context("U2")))
        .await;

    assert!(!missing_field.granted);
    assert!(matching.granted);
}

#[tokio::test]
async fn cyclic_inheritance_terminates_and_grants_reachable_permission() {
    let harness = AccessHarness::new();
    harness
        .seed_permission(permission("production", PermissionAction::Read))
        .await;
    harness
        .seed_permission(permission("inventory", PermissionAction::Read))
        .await;
    harness
        .seed_role(role("a", &["production:read"], &["b"]))
        .await;
    harness
        .seed_role(role("b", &["inventory:read"], &["a"]))
        .await;
    harness
        .repository
        .put_grant(grant("u1", role_target("a"), Utc::now()))
        .await;

    let inherited = harness
        .engine
        .check(&AccessRequest::new("u1", "inventory", PermissionAction::Read))
        .await;
    let missing = harness
        .engine
        .check(&AccessRequest::new("u1", "costs", PermissionAction::Read))
        .await;

    assert!(inherited.granted);
    assert_eq!(inherited.role_id.as_deref(), Some("a"));
    assert!(!missing.granted);
}

#[tokio::test]
async fn earliest_role_grant_provides_the_decision() {
    let harness = AccessHarness::new();
    harness
        .seed_permission(permission("reports", PermissionAction::Export))
        .await;
    harness
        .seed_role(role("analyst", &["reports:export"], &[]))
        .await;
    harness
        .seed_role(role("controller", &["reports:export"], &[]))
        .await;
    let now = Utc::now();
    harness
        .repository
        .put_grant(grant("u1", role_target("controller"), now))
        .await;
    harness
        .repository
        .put_grant(grant(
            "u1",
            role_target("analyst"),
            now - ChronoDuration::days(2),
        ))
        .await;

    let decision = harness
        .engine
        .check(&AccessRequest::new("u1", "reports", PermissionAction::Export))
        .await;

    assert_eq!(decision.role_id.as_deref(), Some("analyst"));
}

#[tokio::test]
async fn unavailable_store_denies_as_indeterminate() {
    let harness = AccessHarness::new();
    seed_manager_role(&harness).await;
    harness
        .repository
        .put_grant(grant("u1", role_target("manager"), Utc::now()))
        .await;
    harness.repository.unavailable.store(true, Ordering::SeqCst);

    let decision = harness
        .engine
        .check(&AccessRequest::new("u1", "production", PermissionAction::Delete))
        .await;

    assert!(!decision.granted);
    assert_eq!(decision.denial, Some(DenialKind::Indeterminate));
}

#[tokio::test(start_paused = true)]
async fn elapsed_deadline_denies() {
    let harness = AccessHarness::new();
    seed_manager_role(&harness).await;
    harness
        .repository
        .put_grant(grant("u1", role_target("manager"), Utc::now()))
        .await;
    harness.repository.delay_reads(Duration::from_secs(5)).await;

    let decision = harness
        .engine
        .check_with_deadline(
            &AccessRequest::new("u1", "production", PermissionAction::Delete),
            Duration::from_millis(50),
        )
        .await;

    assert!(!decision.granted);
    assert_eq!(decision.denial, Some(DenialKind::TimedOut));
}

#[tokio::test]
async fn require_permission_maps_denial_to_forbidden() {
    let harness = AccessHarness::new();

    let result = harness
        .engine
        .require_permission(
            &UserIdentity::new("u1", "User One", None),
            "security",
            PermissionAction::Manage,
        )
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn invalidation_exposes_grant_written_after_cached_check() {
    let harness = AccessHarness::new();
    seed_manager_role(&harness).await;
    let request = AccessRequest::new("u1", "production", PermissionAction::Delete);
    assert!(!harness.engine.check(&request).await.granted);

    let inserted = harness
        .repository
        .insert_grant(grant("u1", role_target("manager"), Utc::now()))
        .await;
    assert!(inserted.is_ok());
    harness.cache.invalidate_principal("u1").await;

    assert!(harness.engine.check(&request).await.granted);
}
