use thiserror::Error;

/// Failures returned by [`crate::Connection`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GmpError {
    /// the requested board size differs from the connection's
    #[error("Board size must be {0}")]
    WrongSize(u8),
    #[error("Invalid coordinates")]
    InvalidCoordinates,
    #[error("GMP supports board sizes 1 to 22, got {0}")]
    UnsupportedSize(u8),
    #[error("Invalid resend interval: {0}")]
    InvalidResendInterval(String),
    /// another send is still waiting for its acknowledgement
    #[error("Command in progress")]
    CommandInProgress,
    /// the peer answered our command with DENY
    #[error("Command denied")]
    Denied,
    /// the head of the command queue is not what the caller expects
    #[error("Received {0}")]
    Unexpected(String),
    #[error("GMP connection broken")]
    Disconnected,
    #[error("Interrupted")]
    Interrupted,
}
