use thiserror::Error;

/// Failure classes a store operation can surface. Callers branch on the
/// variant instead of decoding a sentinel value.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,
    #[error("uniqueness constraint violated")]
    Duplicate,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Classifies a raw sqlx error, promoting unique-constraint violations
    /// (Postgres 23505) and missing rows to their own variants.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return StoreError::NotFound;
        }
        if is_unique_violation(&err) {
            return StoreError::Duplicate;
        }
        StoreError::Database(err)
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}
