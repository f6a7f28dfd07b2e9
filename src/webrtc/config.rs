//! WebRTC configuration

use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use webrtc::ice_transport::ice_server::RTCIceServer;

/// Public STUN server used when nothing else is configured
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// WebRTC configuration
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebRtcConfig {
    /// STUN server URLs
    pub stun_servers: Vec<String>,
    /// TURN server configuration
    pub turn_servers: Vec<TurnServer>,
    /// Request an inbound audio track next to the video track
    pub receive_audio: bool,
    /// mDNS candidate mode: "disabled", "query_only", "query_and_gather"
    pub mdns_mode: Option<String>,
}

impl Default for WebRtcConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            turn_servers: vec![],
            receive_audio: true,
            mdns_mode: None,
        }
    }
}

impl WebRtcConfig {
    /// Build the ICE server list handed to the peer connection
    pub fn ice_servers(&self) -> Vec<RTCIceServer> {
        let mut ice_servers = vec![];

        for stun_url in &self.stun_servers {
            ice_servers.push(RTCIceServer {
                urls: vec![stun_url.clone()],
                ..Default::default()
            });
        }

        for turn in &self.turn_servers {
            ice_servers.push(RTCIceServer {
                urls: turn.urls.clone(),
                username: turn.username.clone(),
                credential: turn.credential.clone(),
                ..Default::default()
            });
        }

        ice_servers
    }

    /// Whether any relay (TURN) server is configured
    pub fn has_turn(&self) -> bool {
        self.turn_servers.iter().any(|t| !t.urls.is_empty())
    }
}

/// TURN server configuration
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnServer {
    /// TURN server URLs (e.g., ["turn:turn.example.com:3478?transport=udp", "turn:turn.example.com:3478?transport=tcp"])
    /// Multiple URLs allow fallback between UDP and TCP transports
    pub urls: Vec<String>,
    /// Username for TURN authentication
    pub username: String,
    /// Credential for TURN authentication
    pub credential: String,
}

impl TurnServer {
    /// Create a TurnServer with a single URL
    pub fn new(url: String, username: String, credential: String) -> Self {
        Self {
            urls: vec![url],
            username,
            credential,
        }
    }
}

/// Which signaling path viewers use to exchange descriptions
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignalingMode {
    /// POST `application/sdp` to the media gateway (WHEP)
    #[default]
    Whep,
    /// POST a JSON offer to the dashboard backend's stream endpoint
    BackendOffer,
}

impl std::fmt::Display for SignalingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalingMode::Whep => write!(f, "whep"),
            SignalingMode::BackendOffer => write!(f, "backend_offer"),
        }
    }
}

/// Signaling configuration
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// Signaling path
    pub mode: SignalingMode,
    /// Media gateway base URL; a camera's gateway URL is `{base}/{camera_id}`
    pub gateway_base_url: String,
    /// Well-known sub-path appended to gateway URLs in WHEP mode
    pub whep_path: Option<String>,
    /// Basic-auth username (used when the gateway URL carries none)
    pub username: Option<String>,
    /// Basic-auth password
    pub password: Option<String>,
    /// Dashboard backend base URL (backend offer mode)
    pub api_base_url: String,
    /// HTTP request timeout in milliseconds (none = HTTP client default)
    pub request_timeout_ms: Option<u64>,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            mode: SignalingMode::Whep,
            gateway_base_url: "http://localhost:8889".to_string(),
            whep_path: Some("whep".to_string()),
            username: None,
            password: None,
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_public_stun() {
        let config = WebRtcConfig::default();
        let servers = config.ice_servers();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].urls, vec![DEFAULT_STUN_SERVER.to_string()]);
        assert!(!config.has_turn());
    }

    #[test]
    fn test_turn_servers_carry_credentials() {
        let config = WebRtcConfig {
            stun_servers: vec![],
            turn_servers: vec![TurnServer::new(
                "turn:relay.example.com:3478".to_string(),
                "user".to_string(),
                "secret".to_string(),
            )],
            ..Default::default()
        };

        let servers = config.ice_servers();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].username, "user");
        assert_eq!(servers[0].credential, "secret");
        assert!(config.has_turn());
    }
}
