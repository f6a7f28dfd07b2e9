//! WebRTC peer connection transport (receive-only)

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::ice::mdns::MulticastDnsMode;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_remote::TrackRemote;

use super::config::WebRtcConfig;
use super::mdns::{default_mdns_host_name, mdns_mode, mdns_mode_label};
use super::transport::{
    InboundTrack, MediaChunk, MediaKind, MediaTransport, TrackInfo, TransportEvent,
    TransportEventSender, TransportFactory, TransportState,
};
use crate::error::{StreamError, StreamResult};

/// Buffered media chunks per inbound track before chunks are dropped
const MEDIA_CHANNEL_CAPACITY: usize = 256;

/// Receive-only peer connection
pub struct PeerTransport {
    /// Session ID
    session_id: String,
    /// WebRTC peer connection
    pc: Arc<RTCPeerConnection>,
    /// RTP reader tasks, one per inbound track
    readers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl PeerTransport {
    /// Create a new peer connection with recv-only transceivers
    pub async fn new(
        config: &WebRtcConfig,
        session_id: String,
        events: TransportEventSender,
    ) -> StreamResult<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(|e| {
            StreamError::NegotiationFailure(format!("Failed to register codecs: {}", e))
        })?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine).map_err(|e| {
            StreamError::NegotiationFailure(format!("Failed to register interceptors: {}", e))
        })?;

        let mut setting_engine = SettingEngine::default();
        let mode = mdns_mode(config.mdns_mode.as_deref());
        setting_engine.set_ice_multicast_dns_mode(mode);
        if mode == MulticastDnsMode::QueryAndGather {
            setting_engine.set_multicast_dns_host_name(default_mdns_host_name(&session_id));
        }
        debug!(
            "WebRTC mDNS mode: {} (session {})",
            mdns_mode_label(mode),
            session_id
        );

        let api = APIBuilder::new()
            .with_setting_engine(setting_engine)
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config.ice_servers(),
            ..Default::default()
        };

        let pc = api.new_peer_connection(rtc_config).await.map_err(|e| {
            StreamError::NegotiationFailure(format!("Failed to create peer connection: {}", e))
        })?;
        let pc = Arc::new(pc);

        add_recvonly_transceiver(&pc, RTPCodecType::Video).await?;
        if config.receive_audio {
            add_recvonly_transceiver(&pc, RTPCodecType::Audio).await?;
        }

        let transport = Self {
            session_id,
            pc,
            readers: Arc::new(Mutex::new(Vec::new())),
        };
        transport.setup_event_handlers(events);

        info!(
            "Peer transport created: {} (audio={})",
            transport.session_id, config.receive_audio
        );
        Ok(transport)
    }

    /// Forward connection state changes and remote tracks as transport events
    fn setup_event_handlers(&self, events: TransportEventSender) {
        let state_events = events.clone();
        let session_id = self.session_id.clone();

        self.pc
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                let events = state_events.clone();
                let session_id = session_id.clone();

                Box::pin(async move {
                    let new_state = match s {
                        RTCPeerConnectionState::New => TransportState::New,
                        RTCPeerConnectionState::Connecting => TransportState::Connecting,
                        RTCPeerConnectionState::Connected => TransportState::Connected,
                        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
                        RTCPeerConnectionState::Failed => TransportState::Failed,
                        RTCPeerConnectionState::Closed => TransportState::Closed,
                        _ => return,
                    };

                    debug!("Peer {} connection state: {}", session_id, new_state);
                    let _ = events.send(TransportEvent::State(new_state));
                })
            }));

        let readers = self.readers.clone();
        let session_id = self.session_id.clone();

        self.pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = events.clone();
                let readers = readers.clone();
                let session_id = session_id.clone();

                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Video => MediaKind::Video,
                        RTPCodecType::Audio => MediaKind::Audio,
                        _ => {
                            debug!("Peer {} ignoring track of unknown kind", session_id);
                            return;
                        }
                    };

                    let info = TrackInfo {
                        id: track.id(),
                        stream_id: track.stream_id(),
                        kind,
                        codec: track.codec().capability.mime_type,
                    };
                    info!(
                        "Peer {} received {} track {} ({})",
                        session_id, info.kind, info.id, info.codec
                    );

                    let (media_tx, media_rx) = mpsc::channel(MEDIA_CHANNEL_CAPACITY);
                    let handle = tokio::spawn(read_track(track, kind, media_tx, session_id));
                    readers.lock().push(handle);

                    let _ = events.send(TransportEvent::Track(InboundTrack {
                        info,
                        media: media_rx,
                    }));
                })
            },
        ));
    }
}

#[async_trait]
impl MediaTransport for PeerTransport {
    async fn create_offer(&self) -> StreamResult<String> {
        let offer = self.pc.create_offer(None).await.map_err(|e| {
            StreamError::NegotiationFailure(format!("Failed to create offer: {}", e))
        })?;

        // Subscribe before setting the local description so completion is not missed
        let mut gather_complete = self.pc.gathering_complete_promise().await;

        self.pc.set_local_description(offer).await.map_err(|e| {
            StreamError::NegotiationFailure(format!("Failed to set local description: {}", e))
        })?;

        let _ = gather_complete.recv().await;

        let local = self.pc.local_description().await.ok_or_else(|| {
            StreamError::NegotiationFailure("No local description after gathering".to_string())
        })?;

        debug!(
            "Peer {} local description ready ({} bytes)",
            self.session_id,
            local.sdp.len()
        );
        Ok(local.sdp)
    }

    async fn apply_answer(&self, sdp: &str) -> StreamResult<()> {
        let answer = RTCSessionDescription::answer(sdp.to_owned()).map_err(|e| {
            StreamError::NegotiationFailure(format!("Invalid SDP answer: {}", e))
        })?;

        self.pc.set_remote_description(answer).await.map_err(|e| {
            StreamError::NegotiationFailure(format!("Failed to set remote description: {}", e))
        })
    }

    async fn close(&self) -> StreamResult<()> {
        for handle in self.readers.lock().drain(..) {
            handle.abort();
        }

        self.pc.close().await.map_err(|e| {
            StreamError::NegotiationFailure(format!("Failed to close peer connection: {}", e))
        })?;

        debug!("Peer transport closed: {}", self.session_id);
        Ok(())
    }
}

async fn add_recvonly_transceiver(
    pc: &Arc<RTCPeerConnection>,
    kind: RTPCodecType,
) -> StreamResult<()> {
    pc.add_transceiver_from_kind(
        kind,
        Some(RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Recvonly,
            send_encodings: vec![],
        }),
    )
    .await
    .map_err(|e| {
        StreamError::NegotiationFailure(format!("Failed to add {:?} transceiver: {}", kind, e))
    })?;
    Ok(())
}

/// Drain RTP packets of a remote track into the media channel
///
/// Chunks are dropped when the consumer falls behind; reading never blocks
/// on rendering.
async fn read_track(
    track: Arc<TrackRemote>,
    kind: MediaKind,
    media_tx: mpsc::Sender<MediaChunk>,
    session_id: String,
) {
    let mut dropped: u64 = 0;

    loop {
        let (packet, _) = match track.read_rtp().await {
            Ok(read) => read,
            Err(e) => {
                debug!("Peer {} {} track ended: {}", session_id, kind, e);
                break;
            }
        };

        let chunk = MediaChunk {
            kind,
            payload: packet.payload,
            timestamp: packet.header.timestamp,
            marker: packet.header.marker,
        };

        match media_tx.try_send(chunk) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                trace!("Peer {} dropped {} chunk (total {})", session_id, kind, dropped);
            }
            Err(TrySendError::Closed(_)) => break,
        }
    }
}

/// Factory creating [`PeerTransport`]s from the WebRTC configuration
pub struct PeerTransportFactory {
    config: WebRtcConfig,
}

impl PeerTransportFactory {
    pub fn new(config: WebRtcConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for PeerTransportFactory {
    async fn open(
        &self,
        session_id: &str,
        events: TransportEventSender,
    ) -> StreamResult<Arc<dyn MediaTransport>> {
        let transport = PeerTransport::new(&self.config, session_id.to_string(), events).await?;
        Ok(Arc::new(transport))
    }
}
