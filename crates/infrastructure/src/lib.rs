//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_access_repository;
mod in_memory_audit_store;
mod postgres_access_repository;
mod postgres_audit_store;
mod postgres_errors;

pub use in_memory_access_repository::InMemoryAccessRepository;
pub use in_memory_audit_store::InMemoryAuditStore;
pub use postgres_access_repository::PostgresAccessRepository;
pub use postgres_audit_store::PostgresAuditStore;

/// Embedded schema migrations for the PostgreSQL adapters.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
