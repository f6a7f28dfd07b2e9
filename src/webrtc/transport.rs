//! Transport abstraction driven by the connection controller
//!
//! The controller is the sole mutator of a transport. Connectivity changes
//! and inbound tracks are delivered as [`TransportEvent`]s on a channel so
//! that they become explicit state-machine inputs instead of callback chains.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use typeshare::typeshare;

use crate::error::StreamResult;

/// Connectivity signal reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportState::New => write!(f, "new"),
            TransportState::Connecting => write!(f, "connecting"),
            TransportState::Connected => write!(f, "connected"),
            TransportState::Disconnected => write!(f, "disconnected"),
            TransportState::Failed => write!(f, "failed"),
            TransportState::Closed => write!(f, "closed"),
        }
    }
}

/// Media kind of an inbound track
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Description of an inbound track
#[typeshare]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Track ID
    pub id: String,
    /// Media stream the track belongs to
    pub stream_id: String,
    /// Video or audio
    pub kind: MediaKind,
    /// Codec MIME type (e.g. "video/H264")
    pub codec: String,
}

/// One unit of received media (RTP payload)
#[derive(Debug, Clone)]
pub struct MediaChunk {
    pub kind: MediaKind,
    pub payload: Bytes,
    /// RTP timestamp
    pub timestamp: u32,
    /// RTP marker bit (end of a video frame)
    pub marker: bool,
}

/// Inbound track with its media feed
#[derive(Debug)]
pub struct InboundTrack {
    pub info: TrackInfo,
    pub media: mpsc::Receiver<MediaChunk>,
}

/// Events emitted by a transport
#[derive(Debug)]
pub enum TransportEvent {
    /// Connectivity signal changed
    State(TransportState),
    /// A remote track arrived
    Track(InboundTrack),
}

/// Sender half handed to a transport at creation
pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;

/// A receive-only peer transport
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Create the local offer and wait until address gathering completes
    ///
    /// Returns the final local description including gathered candidates.
    async fn create_offer(&self) -> StreamResult<String>;

    /// Apply the remote answer
    async fn apply_answer(&self, sdp: &str) -> StreamResult<()>;

    /// Release the transport
    async fn close(&self) -> StreamResult<()>;
}

/// Allocates transports for new sessions
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Create a transport for `session_id`, reporting events on `events`
    async fn open(
        &self,
        session_id: &str,
        events: TransportEventSender,
    ) -> StreamResult<Arc<dyn MediaTransport>>;
}
