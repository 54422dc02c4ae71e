use thiserror::Error;

/// Broad classification used when reporting a failure back to the
/// originating connection.
///
/// Invalid requests are rejected synchronously with no state change;
/// transient storage failures abort the operation before any push is
/// emitted and may be retried by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    TransientStorage,
}

impl ErrorKind {
    /// Machine-readable code reported over the wire.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::TransientStorage => "TRANSIENT_STORAGE",
        }
    }
}

/// Errors from identity validation.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity must not be empty")]
    Empty,

    #[error("identity too long: {0} bytes")]
    TooLong(usize),

    #[error("identity contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Errors from repository operations (used by trait definitions in parley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("storage call timed out")]
    Timeout,
}

/// Errors from message routing, aggregation, and history reads.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message text must not be empty")]
    EmptyMessage,

    #[error("cannot send a message to yourself")]
    SelfMessage,

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::EmptyMessage | ChatError::SelfMessage => ErrorKind::InvalidRequest,
            ChatError::Storage(_) => ErrorKind::TransientStorage,
        }
    }
}

/// Errors from session initiation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot open a session with yourself")]
    SelfSession,

    #[error("unknown user: {0}")]
    UnknownTarget(String),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::SelfSession | SessionError::UnknownTarget(_) => {
                ErrorKind::InvalidRequest
            }
            SessionError::Storage(_) => ErrorKind::TransientStorage,
        }
    }
}
