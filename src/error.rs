use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry error [{status}]: {message}")]
    Registry { status: u16, message: String },


    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Failures of a single viewing session
///
/// These never escape the connection controller: they are recorded on the
/// session and surfaced as a `failed` observation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The signaling request could not be made (network unreachable, DNS, TLS)
    #[error("Signaling failed: {0}")]
    SignalingFailure(String),

    /// The gateway answered with a non-success status
    #[error("Gateway rejected offer (HTTP {status}): {body}")]
    GatewayRejected { status: u16, body: String },

    /// The local transport failed after (or while) exchanging descriptions
    #[error("Negotiation failed: {0}")]
    NegotiationFailure(String),

    /// A late result for a session that was already torn down
    #[error("Discarded result of stale session (generation {generation})")]
    StaleSessionDiscarded { generation: u64 },
}

impl StreamError {
    /// Stable identifier used in events and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SignalingFailure(_) => "signaling_failure",
            Self::GatewayRejected { .. } => "gateway_rejected",
            Self::NegotiationFailure(_) => "negotiation_failure",
            Self::StaleSessionDiscarded { .. } => "stale_session_discarded",
        }
    }

    /// Whether the error should be shown to the user
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::StaleSessionDiscarded { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type for session-level operations
pub type StreamResult<T> = std::result::Result<T, StreamError>;
