//! Error mapping between the DB layer and the API layer

use shared::error::{AppError, ErrorCode};

/// Map a sqlx error into an opaque AppError, logging the cause.
///
/// Infrastructure details never reach the client; the tracing event is the
/// place to look.
pub fn db_err(e: sqlx::Error) -> AppError {
    tracing::error!(error = %e, "Database error");
    AppError::new(ErrorCode::InternalError)
}

/// True when the error is a Postgres unique-constraint violation.
///
/// The generated ledger references collide in theory; the unique index makes
/// the collision an observable conflict instead of an overwrite.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
