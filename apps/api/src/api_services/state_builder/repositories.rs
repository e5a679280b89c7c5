use std::sync::Arc;

use shopfloor_application::{AccessRepositories, AuditStore};
use shopfloor_core::AppError;
use shopfloor_infrastructure::{
    InMemoryAccessRepository, InMemoryAuditStore, PostgresAccessRepository, PostgresAuditStore,
};
use sqlx::PgPool;
use tracing::warn;

use crate::api_config::AccessStoreKind;

pub(super) struct StoreSet {
    pub(super) access: AccessRepositories,
    pub(super) audit_store: Arc<dyn AuditStore>,
}

pub(super) fn build_store_set(
    kind: AccessStoreKind,
    pool: Option<&PgPool>,
) -> Result<StoreSet, AppError> {
    match kind {
        AccessStoreKind::Postgres => {
            let pool = pool.ok_or_else(|| {
                AppError::Internal("postgres access store requires a database pool".to_owned())
            })?;
            Ok(StoreSet {
                access: AccessRepositories::from_shared(Arc::new(PostgresAccessRepository::new(
                    pool.clone(),
                ))),
                audit_store: Arc::new(PostgresAuditStore::new(pool.clone())),
            })
        }
        AccessStoreKind::Memory => {
            warn!("using in-memory access store; grants and audit entries are lost on restart");
            Ok(StoreSet {
                access: AccessRepositories::from_shared(Arc::new(InMemoryAccessRepository::new())),
                audit_store: Arc::new(InMemoryAuditStore::new()),
            })
        }
    }
}
