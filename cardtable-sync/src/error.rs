use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::protocol::ProtocolError;

/// Errors surfaced by the connection session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(#[from] tungstenite::Error),
    /// The token is empty, not a valid header value, or was refused by
    /// the server.
    #[error("Invalid session token")]
    InvalidToken,
    #[error("Session is closed")]
    Closed,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl SessionError {
    /// Whether reconnecting could help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Transport(_))
    }
}
