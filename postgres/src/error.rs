//! Mapping from sqlx errors onto [`StoreError`].

use standbook_core::gateway::StoreError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Classify a sqlx error.
///
/// Connection-level failures, serialization failures and deadlocks are
/// retryable and map to [`StoreError::Unavailable`].
pub(crate) fn store_error(error: sqlx::Error) -> StoreError {
    let mapped = match &error {
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => StoreError::UniqueViolation(message),
                Some(FOREIGN_KEY_VIOLATION) => StoreError::MissingReference(message),
                Some(CHECK_VIOLATION) => StoreError::MissingReference(format!(
                    "value rejected by constraint: {message}"
                )),
                Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED) => StoreError::Unavailable(message),
                _ => StoreError::Database(message),
            }
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(error.to_string()),
        _ => StoreError::Database(error.to_string()),
    };

    let kind = match &mapped {
        StoreError::Unavailable(_) => "unavailable",
        StoreError::UniqueViolation(_) => "unique_violation",
        StoreError::MissingReference(_) => "missing_reference",
        StoreError::Database(_) => "database",
    };
    metrics::counter!("db_errors_total", "kind" => kind).increment(1);
    if matches!(mapped, StoreError::Database(_)) {
        tracing::error!(error = %error, "Database error");
    }
    mapped
}

/// A stored value that does not decode into the domain model.
pub(crate) fn corrupt(column: &str, value: &str) -> StoreError {
    StoreError::Database(format!("unexpected {column} value {value:?}"))
}
