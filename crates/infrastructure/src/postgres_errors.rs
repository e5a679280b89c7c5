use shopfloor_core::AppError;

const UNIQUE_VIOLATION: &str = "23505";

/// Maps a driver error, treating connectivity failures as transient.
pub(crate) fn map_sqlx_error(error: sqlx::Error, context: &str) -> AppError {
    match &error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => AppError::Unavailable(format!("{context}: {error}")),
        _ => AppError::Internal(format!("{context}: {error}")),
    }
}

/// Maps a driver error on insert, reporting unique violations as conflicts.
pub(crate) fn map_insert_error(error: sqlx::Error, context: &str, conflict: String) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some(UNIQUE_VIOLATION)
    {
        return AppError::Conflict(conflict);
    }

    map_sqlx_error(error, context)
}
