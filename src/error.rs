use thiserror::Error;

/// Failures coming back from the hosted document store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("permission denied on {collection}")]
    PermissionDenied { collection: String },

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("malformed document in {collection}: {reason}")]
    BadDocument { collection: String, reason: String },
}

impl From<rusqlite::Error> for PersistError {
    fn from(err: rusqlite::Error) -> Self {
        PersistError::Storage(err.to_string())
    }
}

/// Orchestrator-level failure of a primary write. Compensating writes
/// never produce one of these; they are logged and dropped.
#[derive(Debug, Error)]
pub enum OpError {
    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("document encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no lesson at index {index} in class {class_id}")]
    LessonIndex { class_id: String, index: usize },
}

/// Sign-in failures, classified for the login screen.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoginError {
    #[error("no account matches this address")]
    UserNotFound,

    #[error("wrong password")]
    WrongPassword,

    #[error("malformed email address")]
    InvalidEmail,

    #[error("unrecognized email domain")]
    UnknownDomain,

    #[error("sign-in failed: {0}")]
    Other(String),
}
