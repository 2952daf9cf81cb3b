//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use shopsync_domain::SyncError;

/// Error newtype that keeps conversions on the infrastructure side and can
/// be converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub SyncError);

impl From<InfraError> for SyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<SyncError> for InfraError {
    fn from(value: SyncError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and
/// within this module.
trait IntoSyncError {
    fn into_sync(self) -> SyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → SyncError */
/* -------------------------------------------------------------------------- */

impl IntoSyncError for SqlError {
    fn into_sync(self) -> SyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    // Busy and locked clear on their own; let callers retry.
                    ErrorCode::DatabaseBusy => SyncError::Transient("database is busy".into()),
                    ErrorCode::DatabaseLocked => SyncError::Transient("database is locked".into()),
                    ErrorCode::ConstraintViolation => {
                        SyncError::Conflict(format!("constraint violation: {message}"))
                    }
                    _ => SyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => SyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                SyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                SyncError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => SyncError::Database("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidQuery => SyncError::Database("invalid SQL query".into()),
            other => SyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_sync())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → SyncError */
/* -------------------------------------------------------------------------- */

impl IntoSyncError for HttpError {
    fn into_sync(self) -> SyncError {
        if self.is_timeout() {
            return SyncError::Transient("HTTP request timed out".into());
        }

        if self.is_connect() {
            return SyncError::Transient("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => SyncError::CredentialExpired(message),
                404 => SyncError::NotFound(message),
                409 => SyncError::Conflict(message),
                429 => SyncError::Transient(message),
                400..=499 => SyncError::Validation(message),
                _ => SyncError::Transient(message),
            };
        }

        SyncError::Transient(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_sync())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
