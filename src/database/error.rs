use std::fmt;

use crate::error::{AppError, AppErrorKind, InfrastructureError};

#[derive(Debug, Clone)]
pub enum DatabaseErrorKind {
    /// Pool exhausted, connection dropped or the server is unreachable
    Connection { message: String },
    /// Query rejected by the server
    Query { message: String },
    /// Unique or foreign key constraint violated
    Constraint { message: String },
    /// begin/commit/rollback failed
    Transaction { message: String },
    /// Injected by the in-memory store
    Simulated { message: String },
    Unknown { message: String },
}

#[derive(Debug, Clone)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseErrorKind::Connection {
                    message: err.to_string(),
                }
            }
            sqlx::Error::Database(db_err)
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() =>
            {
                DatabaseErrorKind::Constraint {
                    message: db_err.message().to_string(),
                }
            }
            sqlx::Error::Database(db_err) => DatabaseErrorKind::Query {
                message: db_err.message().to_string(),
            },
            _ => DatabaseErrorKind::Unknown {
                message: err.to_string(),
            },
        };
        Self { kind }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::Transaction {
            message: message.into(),
        })
    }

    pub fn message(&self) -> &str {
        match &self.kind {
            DatabaseErrorKind::Connection { message }
            | DatabaseErrorKind::Query { message }
            | DatabaseErrorKind::Constraint { message }
            | DatabaseErrorKind::Transaction { message }
            | DatabaseErrorKind::Simulated { message }
            | DatabaseErrorKind::Unknown { message } => message,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::Connection { .. })
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            DatabaseErrorKind::Connection { .. } => "connection",
            DatabaseErrorKind::Query { .. } => "query",
            DatabaseErrorKind::Constraint { .. } => "constraint",
            DatabaseErrorKind::Transaction { .. } => "transaction",
            DatabaseErrorKind::Simulated { .. } => "simulated",
            DatabaseErrorKind::Unknown { .. } => "unknown",
        };
        write!(f, "database {} error: {}", label, self.message())
    }
}

impl std::error::Error for DatabaseError {}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        Self::from_sqlx(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            is_retryable: err.is_retryable(),
            message: err.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_retryable_connection_error() {
        let err = DatabaseError::from_sqlx(sqlx::Error::PoolTimedOut);
        assert!(matches!(err.kind, DatabaseErrorKind::Connection { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn row_not_found_maps_to_unknown() {
        let err = DatabaseError::from_sqlx(sqlx::Error::RowNotFound);
        assert!(matches!(err.kind, DatabaseErrorKind::Unknown { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn converts_into_server_error() {
        let app: AppError = DatabaseError::transaction("commit failed").into();
        assert_eq!(app.status_code(), 500);
        assert!(!app.user_message().contains("commit failed"));
    }
}
