use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which handle table a lookup went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleKind {
    Database,
    Statement,
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleKind::Database => f.write_str("database"),
            HandleKind::Statement => f.write_str("statement"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("No {kind} with id {id}")]
    NotFound { kind: HandleKind, id: String },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database {database_id} still has {count} open statement(s)")]
    OpenStatements { database_id: String, count: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Bridge unavailable: {0}")]
    Unavailable(String),

    /// An error that already crossed the callback boundary once.
    #[error("{0}")]
    Reported(ErrorDescriptor),
}

impl BridgeError {
    pub(crate) fn statement_not_found(id: &str) -> Self {
        BridgeError::NotFound {
            kind: HandleKind::Statement,
            id: id.to_owned(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::NotFound { .. } => ErrorKind::NotFound,
            BridgeError::Sqlite(_) | BridgeError::OpenStatements { .. } => ErrorKind::EngineError,
            BridgeError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BridgeError::Unavailable(_) => ErrorKind::Unavailable,
            BridgeError::Reported(descriptor) => descriptor.kind,
        }
    }

    /// Flatten into the shape delivered through a callback's error slot.
    #[must_use]
    pub fn to_descriptor(&self) -> ErrorDescriptor {
        match self {
            BridgeError::Reported(descriptor) => descriptor.clone(),
            other => ErrorDescriptor {
                kind: other.kind(),
                message: other.to_string(),
            },
        }
    }
}

/// Coarse error category exposed to bridge callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    EngineError,
    InvalidArgument,
    Unavailable,
}

/// Error payload handed to callbacks.
///
/// Serializes as `{"kind": "NotFound", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
}

impl std::fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<ErrorDescriptor> for BridgeError {
    fn from(descriptor: ErrorDescriptor) -> Self {
        BridgeError::Reported(descriptor)
    }
}
