//! Conversions from external infrastructure errors into domain errors.

use calsync_domain::CalsyncError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can
/// be converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CalsyncError);

impl From<InfraError> for CalsyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CalsyncError> for InfraError {
    fn from(value: CalsyncError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and
/// within this module.
trait IntoCalsyncError {
    fn into_calsync(self) -> CalsyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CalsyncError */
/* -------------------------------------------------------------------------- */

impl IntoCalsyncError for SqlError {
    fn into_calsync(self) -> CalsyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        CalsyncError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        CalsyncError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        CalsyncError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        CalsyncError::Database("foreign key constraint violation".into())
                    }
                    _ => CalsyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CalsyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CalsyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CalsyncError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => CalsyncError::Database("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidQuery => CalsyncError::Database("invalid SQL query".into()),
            other => CalsyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_calsync())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → CalsyncError */
/* -------------------------------------------------------------------------- */

impl IntoCalsyncError for r2d2::Error {
    fn into_calsync(self) -> CalsyncError {
        CalsyncError::Database(format!("connection pool error: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_calsync())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CalsyncError */
/* -------------------------------------------------------------------------- */

impl IntoCalsyncError for HttpError {
    fn into_calsync(self) -> CalsyncError {
        if self.is_timeout() {
            CalsyncError::UpstreamUnavailable("request timed out".into())
        } else if self.is_connect() {
            CalsyncError::UpstreamUnavailable(format!("connection failed: {self}"))
        } else if self.is_decode() {
            CalsyncError::UpstreamUnavailable(format!("malformed response body: {self}"))
        } else {
            CalsyncError::UpstreamUnavailable(self.to_string())
        }
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_calsync())
    }
}
