use thiserror::Error;

/// Typed error hierarchy for sdrlink.
///
/// Use at module boundaries (API calls, state transitions, config and session
/// handling). Internal/leaf functions can continue using `anyhow::Result`; the
/// `Internal` variant allows seamless conversion via the `?` operator.
#[derive(Debug, Error)]
pub enum PairingError {
    /// The request never produced a response (connect failure, timeout, bad body).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status. `detail` is shown verbatim.
    #[error("{detail}")]
    Server { status: u16, detail: String },

    #[error("{detail}")]
    Unauthorized { detail: String },

    /// The backend accepted the request but the feature is not available yet
    /// (for example a QR code that has not been generated).
    #[error("{0}")]
    Unavailable(String),

    #[error("cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using `PairingError`.
pub type PairingResult<T> = std::result::Result<T, PairingError>;

impl PairingError {
    /// Whether this error is transient and the operation could be retried by the user.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Internal(_) => true,
            Self::Server { status, .. } => *status >= 500,
            Self::Unavailable(_) => true,
            Self::Unauthorized { .. }
            | Self::InvalidTransition { .. }
            | Self::Config(_)
            | Self::Session(_) => false,
        }
    }

    /// Message suitable for showing to the operator.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(e) => format!("Could not reach the server: {}", e),
            _ => self.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}
