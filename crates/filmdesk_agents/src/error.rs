//! Error taxonomy for queue, dispatch and matching operations.

use crate::storage::StorageError;
use filmdesk_db::DbError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Bad or missing input
    #[error("{0}")]
    Validation(String),

    /// Unknown project, candidate or job
    #[error("Not found: {0}")]
    NotFound(String),

    /// Feature not enabled or setup incomplete
    #[error("{0}")]
    Precondition(String),

    /// Business-logic failure inside a job handler
    #[error("{0}")]
    Handler(String),

    #[error("Unknown agent type: {0}")]
    UnknownKind(String),

    #[error(transparent)]
    Db(DbError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AgentError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }
}

impl From<DbError> for AgentError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => Self::NotFound(what),
            other => Self::Db(other),
        }
    }
}
