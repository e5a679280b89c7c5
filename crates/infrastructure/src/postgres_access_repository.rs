mod catalog;
mod grants;
mod roles;


use sqlx::PgPool;

/// PostgreSQL-backed access-control repository storing JSONB documents.
#[derive(Clone)]
pub struct PostgresAccessRepository {
    pool: PgPool,
}

impl PostgresAccessRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
