use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use shopfloor_core::{AppError, AppResult};
use shopfloor_domain::{
    AuditLogEntry, GrantAssignment, GrantTarget, PermissionAction, PermissionCondition,
    PermissionDefinition, PermissionDefinitionInput, PermissionLevel, RoleDefinition,
    RoleDefinitionInput, RoleLevel,
};

use crate::access_cache::AccessCache;
use crate::access_ports::{
    AccessRepositories, GrantRepository, PermissionCatalogRepository, RoleRepository,
};
use crate::audit_log::{AuditLog, AuditRetryPolicy};
use crate::audit_ports::{AuditCursor, AuditEvent, AuditLogFilter, AuditOrder, AuditStore};
use crate::audit_sink::AuditSink;
use crate::permission_engine::PermissionEngine;

#[derive(Default)]
pub(crate) struct FakeAuditStore {
    entries: Mutex<Vec<AuditLogEntry>>,
    sequence: AtomicU64,
    failing_puts: AtomicU32,
    pub(crate) put_attempts: AtomicU32,
}

impl FakeAuditStore {
    pub(crate) fn fail_next_puts(&self, count: u32) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    pub(crate) async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditStore for FakeAuditStore {
    async fn put(&self, event: AuditEvent) -> AppResult<AuditLogEntry> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if failing {
            return Err(AppError::Unavailable("audit store offline".to_owned()));
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = AuditLogEntry {
            entry_id: format!("entry-{sequence}"),
            sequence,
            actor: event.actor,
            action: event.action,
            resource: event.resource,
            resource_id: event.resource_id,
            category: event.category,
            severity: event.severity,
            outcome: event.outcome,
            occurred_at: event.occurred_at,
            description: event.description,
            changes: event.changes,
            ip_address: event.ip_address,
            user_agent: event.user_agent,
            session_id: event.session_id,
            correlation_id: event.correlation_id,
        };
        self.entries.lock().await.push(entry.clone());
        Ok(entry)
    }

    async fn query(
        &self,
        filter: &AuditLogFilter,
        order: AuditOrder,
        limit: usize,
        cursor: Option<AuditCursor>,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let mut matching: Vec<AuditLogEntry> = self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| filter.matches(entry))
            .filter(|entry| {
                cursor
                    .as_ref()
                    .is_none_or(|cursor| order.is_past_cursor(entry, cursor))
            })
            .cloned()
            .collect();
        matching.sort_by(|left, right| order.compare(left, right));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn get(&self, entry_id: &str) -> AppResult<Option<AuditLogEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .find(|entry| entry.entry_id == entry_id)
            .cloned())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|entry| entry.occurred_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Default)]
pub(crate) struct FakeAccessRepository {
    permissions: Mutex<BTreeMap<String, PermissionDefinition>>,
    roles: Mutex<BTreeMap<String, RoleDefinition>>,
    grants: Mutex<Vec<GrantAssignment>>,
    pub(crate) unavailable: AtomicBool,
    pub(crate) grant_reads: AtomicUsize,
    pub(crate) definition_reads: AtomicUsize,
    read_delay: Mutex<Option<Duration>>,
    deactivations_before_failure: Mutex<Option<usize>>,
}

impl FakeAccessRepository {
    pub(crate) async fn delay_reads(&self, delay: Duration) {
        *self.read_delay.lock().await = Some(delay);
    }

    /// Lets `allowed` deactivations succeed, then fails every following one.
    pub(crate) async fn fail_deactivations_after(&self, allowed: usize) {
        *self.deactivations_before_failure.lock().await = Some(allowed);
    }

    pub(crate) async fn stored_grants(&self) -> Vec<GrantAssignment> {
        self.grants.lock().await.clone()
    }

    pub(crate) async fn put_grant(&self, grant: GrantAssignment) {
        self.grants.lock().await.push(grant);
    }

    async fn before_read(&self) -> AppResult<()> {
        let delay = *self.read_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable("access store offline".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionCatalogRepository for FakeAccessRepository {
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        self.definition_reads.fetch_add(1, Ordering::SeqCst);
        self.before_read().await?;
        Ok(self.permissions.lock().await.values().cloned().collect())
    }

    async fn find_permission(
        &self,
        permission_id: &str,
    ) -> AppResult<Option<PermissionDefinition>> {
        self.before_read().await?;
        Ok(self.permissions.lock().await.get(permission_id).cloned())
    }

    async fn insert_permission(&self, permission: PermissionDefinition) -> AppResult<()> {
        let mut permissions = self.permissions.lock().await;
        let permission_id = permission.permission_id();
        if permissions.contains_key(&permission_id) {
            return Err(AppError::Conflict(format!(
                "permission '{permission_id}' already exists"
            )));
        }
        permissions.insert(permission_id, permission);
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for FakeAccessRepository {
    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>> {
        self.definition_reads.fetch_add(1, Ordering::SeqCst);
        self.before_read().await?;
        Ok(self.roles.lock().await.values().cloned().collect())
    }

    async fn find_role(&self, role_id: &str) -> AppResult<Option<RoleDefinition>> {
        self.before_read().await?;
        Ok(self.roles.lock().await.get(role_id).cloned())
    }

    async fn insert_role(&self, role: RoleDefinition) -> AppResult<()> {
        let mut roles = self.roles.lock().await;
        if roles.contains_key(role.role_id()) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.role_id()
            )));
        }
        roles.insert(role.role_id().to_owned(), role);
        Ok(())
    }

    async fn update_role(&self, role: RoleDefinition, expected_version: u64) -> AppResult<()> {
        let mut roles = self.roles.lock().await;
        let Some(stored) = roles.get(role.role_id()) else {
            return Err(AppError::NotFound(format!(
                "role '{}' does not exist",
                role.role_id()
            )));
        };
        if stored.version() != expected_version {
            return Err(AppError::Conflict(format!(
                "role '{}' was modified concurrently",
                role.role_id()
            )));
        }
        roles.insert(role.role_id().to_owned(), role);
        Ok(())
    }
}

#[async_trait]
impl GrantRepository for FakeAccessRepository {
    async fn list_grants_for_principal(&self, principal: &str) -> AppResult<Vec<GrantAssignment>> {
        self.grant_reads.fetch_add(1, Ordering::SeqCst);
        self.before_read().await?;
        Ok(self
            .grants
            .lock()
            .await
            .iter()
            .filter(|grant| grant.principal == principal)
            .cloned()
            .collect())
    }

    async fn insert_grant(&self, grant: GrantAssignment) -> AppResult<()> {
        let mut grants = self.grants.lock().await;
        if grant.is_active
            && grants.iter().any(|stored| {
                stored.is_active
                    && stored.principal == grant.principal
                    && stored.target == grant.target
            })
        {
            return Err(AppError::Conflict("duplicate active grant".to_owned()));
        }
        grants.push(grant);
        Ok(())
    }

    async fn deactivate_grant(
        &self,
        grant_id: &str,
        revoked_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        if let Some(remaining) = self.deactivations_before_failure.lock().await.as_mut() {
            if *remaining == 0 {
                return Err(AppError::Unavailable("access store offline".to_owned()));
            }
            *remaining -= 1;
        }

        let mut grants = self.grants.lock().await;
        let Some(grant) = grants
            .iter_mut()
            .find(|grant| grant.grant_id == grant_id && grant.is_active)
        else {
            return Ok(false);
        };

        grant.is_active = false;
        grant.revoked_by = revoked_by.map(str::to_owned);
        grant.revoked_at = Some(at);
        Ok(true)
    }

    async fn list_expired_active_grants(
        &self,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<GrantAssignment>> {
        Ok(self
            .grants
            .lock()
            .await
            .iter()
            .filter(|grant| grant.is_expired_at(now))
            .cloned()
            .collect())
    }
}

pub(crate) fn permission(resource: &str, action: PermissionAction) -> PermissionDefinition {
    conditional_permission(resource, action, Vec::new())
}

pub(crate) fn conditional_permission(
    resource: &str,
    action: PermissionAction,
    conditions: Vec<PermissionCondition>,
) -> PermissionDefinition {
    PermissionDefinition::new(PermissionDefinitionInput {
        resource: resource.to_owned(),
        action,
        description: format!("{} {resource}", action.as_str()),
        category: "operations".to_owned(),
        level: PermissionLevel::Basic,
        conditions,
    })
    .unwrap_or_else(|_| unreachable!())
}

pub(crate) fn role_input(
    role_id: &str,
    permissions: &[&str],
    parents: &[&str],
) -> RoleDefinitionInput {
    RoleDefinitionInput {
        role_id: role_id.to_owned(),
        display_name: String::new(),
        description: String::new(),
        level: RoleLevel::User,
        permissions: permissions.iter().map(|id| (*id).to_owned()).collect(),
        inherits_from: parents.iter().map(|id| (*id).to_owned()).collect(),
        is_system: false,
    }
}

pub(crate) fn role(role_id: &str, permissions: &[&str], parents: &[&str]) -> RoleDefinition {
    RoleDefinition::new(role_input(role_id, permissions, parents), Utc::now())
        .unwrap_or_else(|_| unreachable!())
}

pub(crate) fn grant(
    principal: &str,
    target: GrantTarget,
    granted_at: DateTime<Utc>,
) -> GrantAssignment {
    GrantAssignment {
        grant_id: format!("{principal}-{}-{}", target.kind(), target.target_id()),
        principal: principal.to_owned(),
        target,
        granted_by: "admin".to_owned(),
        granted_at,
        expires_at: None,
        conditions: None,
        is_active: true,
        reason: None,
        revoked_by: None,
        revoked_at: None,
    }
}

pub(crate) fn role_target(role_id: &str) -> GrantTarget {
    GrantTarget::Role {
        role_id: role_id.to_owned(),
    }
}

pub(crate) fn permission_target(permission_id: &str) -> GrantTarget {
    GrantTarget::Permission {
        permission_id: permission_id.to_owned(),
    }
}

pub(crate) fn fast_retry() -> AuditRetryPolicy {
    AuditRetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
    }
}

/// Fully wired access core over fakes.
pub(crate) struct AccessHarness {
    pub(crate) repository: Arc<FakeAccessRepository>,
    pub(crate) audit_store: Arc<FakeAuditStore>,
    pub(crate) repositories: AccessRepositories,
    pub(crate) cache: Arc<AccessCache>,
    pub(crate) audit_log: AuditLog,
    pub(crate) sink: AuditSink,
    pub(crate) engine: PermissionEngine,
}

impl AccessHarness {
    pub(crate) fn new() -> Self {
        let repository = Arc::new(FakeAccessRepository::default());
        let audit_store = Arc::new(FakeAuditStore::default());
        let repositories = AccessRepositories::from_shared(repository.clone());
        let cache = Arc::new(AccessCache::new());
        let audit_log = AuditLog::new(audit_store.clone(), fast_retry());
        let sink = AuditSink::spawn(audit_log.clone());
        let engine = PermissionEngine::new(repositories.clone(), cache.clone(), sink.clone());

        Self {
            repository,
            audit_store,
            repositories,
            cache,
            audit_log,
            sink,
            engine,
        }
    }

    pub(crate) async fn seed_permission(&self, permission: PermissionDefinition) {
        let result = self.repository.insert_permission(permission).await;
        assert!(result.is_ok());
    }

    pub(crate) async fn seed_role(&self, role: RoleDefinition) {
        let result = self.repository.insert_role(role).await;
        assert!(result.is_ok());
    }

    pub(crate) async fn audit_entries(&self) -> Vec<AuditLogEntry> {
        assert!(self.sink.flush().await.is_ok());
        self.audit_store.entries().await
    }
}
