//! Error type shared by the timer, event log, recovery and storage layers.
//!
//! None of these are fatal: every variant leaves the in-memory timer and
//! event log in a valid, continuable state.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// The action does not apply to the current timer state
    /// (placing with no piece held, pausing twice, ...). Nothing was mutated.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Undo was requested on a session without events.
    #[error("no events to undo")]
    EmptyLog,

    /// The backing store could not be reached or rejected the write.
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// A puzzle already has an unended session.
    #[error("puzzle '{0}' already has an active session")]
    ActiveSessionExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TrackerError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        TrackerError::InvalidState(msg.into())
    }

    /// True for failures the write-behind queue should retry later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TrackerError::PersistenceUnavailable(_)
                | TrackerError::Storage(_)
                | TrackerError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
