//! Session error types

use thiserror::Error;

/// Errors from starting or feeding a session
#[derive(Error, Debug)]
pub enum SessionError {
    /// Login or connection failed
    #[error("Failed to start session: {0}")]
    Start(String),

    /// `start` was called twice
    #[error("Session already started")]
    AlreadyStarted,

    /// The event receiver was already handed out
    #[error("Session events were already taken")]
    EventsTaken,

    /// A recorded event could not be parsed
    #[error("Invalid event on line {line}: {source}")]
    InvalidEvent {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
