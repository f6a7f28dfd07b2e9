//! Viewer event types
//!
//! Defines the events broadcast through the event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::webrtc::session::{SessionEvent, SessionState};
use crate::webrtc::transport::TrackInfo;

/// Viewer event enumeration
///
/// Serialized as:
/// ```json
/// {
///   "event": "stream.state_changed",
///   "data": { "camera_id": "cam1", "from": "connecting", "to": "connected", "generation": 1 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ViewerEvent {
    // ============================================================================
    // Viewer Events
    // ============================================================================
    /// A viewer was mounted for a camera
    #[serde(rename = "viewer.mounted")]
    ViewerMounted {
        camera_id: String,
        /// Gateway URL the viewer negotiates against
        gateway_url: String,
    },

    /// A viewer was unmounted
    #[serde(rename = "viewer.unmounted")]
    ViewerUnmounted { camera_id: String },

    // ============================================================================
    // Stream Events
    // ============================================================================
    /// Session state machine moved
    #[serde(rename = "stream.state_changed")]
    StreamStateChanged {
        camera_id: String,
        from: SessionState,
        to: SessionState,
        generation: u64,
    },

    /// Inbound media bound to the viewer's display surface
    #[serde(rename = "stream.track_bound")]
    StreamTrackBound { camera_id: String, track: TrackInfo },

    /// A session failed
    #[serde(rename = "stream.error")]
    StreamError {
        camera_id: String,
        /// Error kind: "signaling_failure", "gateway_rejected", "negotiation_failure"
        kind: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ViewerEvent {
    /// Get the event name (for filtering)
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ViewerMounted { .. } => "viewer.mounted",
            Self::ViewerUnmounted { .. } => "viewer.unmounted",
            Self::StreamStateChanged { .. } => "stream.state_changed",
            Self::StreamTrackBound { .. } => "stream.track_bound",
            Self::StreamError { .. } => "stream.error",
        }
    }

    /// Camera the event belongs to
    pub fn camera_id(&self) -> &str {
        match self {
            Self::ViewerMounted { camera_id, .. }
            | Self::ViewerUnmounted { camera_id }
            | Self::StreamStateChanged { camera_id, .. }
            | Self::StreamTrackBound { camera_id, .. }
            | Self::StreamError { camera_id, .. } => camera_id,
        }
    }

    /// Check if event matches a topic filter
    ///
    /// Supports wildcards: "stream.*" matches all stream events, "*" matches everything.
    pub fn matches_topic(&self, topic: &str) -> bool {
        if topic == "*" {
            return true;
        }

        let event_name = self.event_name();

        if topic.ends_with(".*") {
            let prefix = topic.trim_end_matches(".*");
            event_name.starts_with(prefix)
        } else {
            event_name == topic
        }
    }

    /// Translate a controller event
    ///
    /// A failure yields `stream.state_changed` followed by `stream.error`.
    /// Stale discards and reconnect notices stay internal.
    pub fn from_session_event(camera_id: &str, event: &SessionEvent) -> Vec<Self> {
        match event {
            SessionEvent::StateChanged {
                from,
                to,
                generation,
                error,
            } => {
                let mut events = vec![Self::StreamStateChanged {
                    camera_id: camera_id.to_string(),
                    from: *from,
                    to: *to,
                    generation: *generation,
                }];
                if let Some(err) = error.as_ref().filter(|e| e.is_user_visible()) {
                    events.push(Self::StreamError {
                        camera_id: camera_id.to_string(),
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                        timestamp: Utc::now(),
                    });
                }
                events
            }
            SessionEvent::TrackBound { track, .. } => vec![Self::StreamTrackBound {
                camera_id: camera_id.to_string(),
                track: track.clone(),
            }],
            SessionEvent::StaleDiscarded { .. } | SessionEvent::ReconnectScheduled { .. } => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;

    #[test]
    fn test_event_name() {
        let event = ViewerEvent::ViewerMounted {
            camera_id: "cam1".to_string(),
            gateway_url: "http://gateway:8889/cam1".to_string(),
        };
        assert_eq!(event.event_name(), "viewer.mounted");
        assert_eq!(event.camera_id(), "cam1");
    }

    #[test]
    fn test_matches_topic() {
        let event = ViewerEvent::StreamStateChanged {
            camera_id: "cam1".to_string(),
            from: SessionState::Connecting,
            to: SessionState::Connected,
            generation: 1,
        };

        assert!(event.matches_topic("*"));
        assert!(event.matches_topic("stream.*"));
        assert!(event.matches_topic("stream.state_changed"));
        assert!(!event.matches_topic("viewer.*"));
        assert!(!event.matches_topic("stream.error"));
    }

    #[test]
    fn test_failure_translates_to_state_and_error() {
        let event = SessionEvent::StateChanged {
            from: SessionState::Connecting,
            to: SessionState::Failed,
            generation: 2,
            error: Some(StreamError::GatewayRejected {
                status: 401,
                body: "unauthorized".to_string(),
            }),
        };

        let events = ViewerEvent::from_session_event("cam1", &event);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_name(), "stream.state_changed");
        match &events[1] {
            ViewerEvent::StreamError { kind, message, .. } => {
                assert_eq!(kind, "gateway_rejected");
                assert!(message.contains("401"));
            }
            other => panic!("unexpected event {:?}", other),
        }

        let stale = SessionEvent::StaleDiscarded { generation: 2 };
        assert!(ViewerEvent::from_session_event("cam1", &stale).is_empty());
    }

    #[test]
    fn test_serialization() {
        let event = ViewerEvent::StreamStateChanged {
            camera_id: "cam1".to_string(),
            from: SessionState::Idle,
            to: SessionState::Connecting,
            generation: 1,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("stream.state_changed"));
        assert!(json.contains("\"to\":\"connecting\""));

        let deserialized: ViewerEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(deserialized, ViewerEvent::StreamStateChanged { .. }));
    }
}
