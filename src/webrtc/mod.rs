//! WebRTC viewing sessions
//!
//! Receive-only sessions against a streaming gateway:
//!
//! ```text
//! ConnectionController
//!        |  open / create_offer / apply_answer / close
//!        v
//! MediaTransport (PeerTransport: RTCPeerConnection, recvonly)
//!        |                                   ^
//!        | local SDP offer                   | SDP answer
//!        v                                   |
//! SignalingClient ---- WHEP POST / backend JSON offer ----> Gateway
//!        |
//!        +-- inbound tracks --> RenderSink --> DisplaySurface
//! ```

pub mod config;
pub mod controller;
pub mod mdns;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod target;
pub mod transport;

pub use config::{SignalingConfig, SignalingMode, TurnServer, WebRtcConfig};
pub use controller::{ConnectionController, ReconnectPolicy};
pub use peer::{PeerTransport, PeerTransportFactory};
pub use session::{Connectivity, ConnectivityObservation, Session, SessionEvent, SessionState};
pub use signaling::{
    signaling_client, BackendOfferSignalingClient, SessionDescription, SignalingClient,
    WhepSignalingClient,
};
pub use target::{Credentials, GatewayEndpoint, StreamTarget};
pub use transport::{
    InboundTrack, MediaChunk, MediaKind, MediaTransport, TrackInfo, TransportEvent,
    TransportFactory, TransportState,
};
