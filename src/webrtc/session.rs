//! Viewing session state

use std::time::Instant;

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use super::transport::TrackInfo;
use crate::error::StreamError;

/// Negotiation state of a session
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl SessionState {
    /// Whether the state machine allows moving from `self` to `to`
    ///
    /// `Idle` is reachable from anywhere (teardown). Re-entering
    /// `Connecting` from `Failed`/`Disconnected` starts a new session.
    pub fn can_transition(self, to: SessionState) -> bool {
        use SessionState::*;

        match (self, to) {
            (_, Idle) => true,
            (Idle, Connecting) => true,
            (Connecting, Connected) | (Connecting, Failed) => true,
            (Connected, Disconnected) | (Connected, Failed) => true,
            (Disconnected, Connected) | (Disconnected, Failed) => true,
            (Failed, Connecting) | (Disconnected, Connecting) => true,
            _ => false,
        }
    }

    /// Whether a transport may be allocated in this state
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::Connected | SessionState::Disconnected
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Runtime negotiation state of one viewing session
///
/// Owned by the connection controller; never shared across sessions.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session ID (also names the transport)
    pub id: String,
    /// Generation the session was created under
    pub generation: u64,
    pub state: SessionState,
    pub local_description: Option<String>,
    pub remote_description: Option<String>,
    /// First bound inbound track, present once media arrived
    pub inbound_track: Option<TrackInfo>,
    pub last_error: Option<StreamError>,
    pub created_at: Instant,
}

impl Session {
    pub fn new(generation: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            generation,
            state: SessionState::Connecting,
            local_description: None,
            remote_description: None,
            inbound_track: None,
            last_error: None,
            created_at: Instant::now(),
        }
    }
}

/// Connectivity as shown to the user
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl From<SessionState> for Connectivity {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Idle | SessionState::Disconnected => Connectivity::Disconnected,
            SessionState::Connecting => Connectivity::Connecting,
            SessionState::Connected => Connectivity::Connected,
            SessionState::Failed => Connectivity::Failed,
        }
    }
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connectivity::Connecting => write!(f, "connecting"),
            Connectivity::Connected => write!(f, "connected"),
            Connectivity::Disconnected => write!(f, "disconnected"),
            Connectivity::Failed => write!(f, "failed"),
        }
    }
}

/// Read-only connectivity snapshot derived from the session
#[typeshare]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityObservation {
    pub state: Connectivity,
    /// Human-readable error message, if the session failed
    pub message: Option<String>,
}

impl ConnectivityObservation {
    pub fn idle() -> Self {
        Self {
            state: Connectivity::Disconnected,
            message: None,
        }
    }

    pub fn from_session(session: Option<&Session>) -> Self {
        match session {
            Some(session) => Self {
                state: session.state.into(),
                message: session
                    .last_error
                    .as_ref()
                    .filter(|e| e.is_user_visible())
                    .map(|e| e.to_string()),
            },
            None => Self::idle(),
        }
    }

    /// Status text overlaid on the display surface
    pub fn status_text(&self) -> String {
        match (&self.state, &self.message) {
            (Connectivity::Failed, Some(message)) => message.clone(),
            (Connectivity::Connecting, _) => "Connecting...".to_string(),
            (state, _) => state.to_string(),
        }
    }
}

/// Events published by the connection controller
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session state machine moved
    StateChanged {
        from: SessionState,
        to: SessionState,
        generation: u64,
        error: Option<StreamError>,
    },
    /// Inbound media was bound to the render sink
    TrackBound { generation: u64, track: TrackInfo },
    /// A late result of a torn-down session was dropped
    StaleDiscarded { generation: u64 },
    /// The single automatic reconnect is pending
    ReconnectScheduled { generation: u64, delay_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use SessionState::*;

        assert!(Idle.can_transition(Connecting));
        assert!(Connecting.can_transition(Connected));
        assert!(Connecting.can_transition(Failed));
        assert!(Connected.can_transition(Disconnected));
        assert!(Failed.can_transition(Connecting));
        assert!(Connected.can_transition(Idle));
        assert!(Disconnected.can_transition(Connected));
        assert!(Disconnected.can_transition(Connecting));

        assert!(!Idle.can_transition(Connected));
        assert!(!Connected.can_transition(Connecting));
        assert!(!Failed.can_transition(Connected));
    }

    #[test]
    fn test_observation_from_session() {
        assert_eq!(ConnectivityObservation::from_session(None), ConnectivityObservation::idle());

        let mut session = Session::new(1);
        session.state = SessionState::Failed;
        session.last_error = Some(StreamError::GatewayRejected {
            status: 401,
            body: "unauthorized".to_string(),
        });

        let observation = ConnectivityObservation::from_session(Some(&session));
        assert_eq!(observation.state, Connectivity::Failed);
        assert_eq!(
            observation.status_text(),
            "Gateway rejected offer (HTTP 401): unauthorized"
        );
    }

    #[test]
    fn test_status_text() {
        let observation = ConnectivityObservation {
            state: Connectivity::Connecting,
            message: None,
        };
        assert_eq!(observation.status_text(), "Connecting...");
        assert_eq!(ConnectivityObservation::idle().status_text(), "disconnected");
    }
}
