//! Errors surfaced to callers of the session controller.
//!
//! Adapter failures never show up here; they are logged and the affected
//! tick is dropped.

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `start()` while a session is already running
    #[error("session already active")]
    AlreadyActive,

    /// No detector adapter has finished initialising
    #[error("no detector adapter is ready")]
    NotReady,

    /// Query, export or stop with no running or recently stopped session
    #[error("no active or recent session")]
    NoActiveOrRecentSession,

    /// The polling loops for a new session could not be launched
    #[error("failed to start polling: {0:#}")]
    Sensing(anyhow::Error),

    #[error("question must be a non-empty string")]
    EmptyQuestion,

    #[error("export failed: {0}")]
    Export(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("answer service failed: {0:#}")]
    Answer(anyhow::Error),
}

impl SessionError {
    /// True for the lifecycle misuse errors (start/stop/query in the wrong state).
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            SessionError::AlreadyActive
                | SessionError::NotReady
                | SessionError::NoActiveOrRecentSession
        )
    }
}
