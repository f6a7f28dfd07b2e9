use serde::{Deserialize, Serialize};
use std::time::Duration;
use typeshare::typeshare;

// Re-export the WebRTC/signaling sections from the webrtc module
pub use crate::webrtc::config::{SignalingConfig, WebRtcConfig};
use crate::webrtc::controller::ReconnectPolicy;

/// Main application configuration
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Peer connection settings (ICE servers, audio, mDNS)
    pub webrtc: WebRtcConfig,
    /// Signaling path and gateway settings
    pub signaling: SignalingConfig,
    /// Camera registry settings
    pub registry: RegistryConfig,
    /// Viewer behaviour
    pub viewer: ViewerConfig,
}

/// Camera registry configuration
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry API base URL (e.g., http://localhost:8000)
    pub base_url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

/// Viewer configuration
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerConfig {
    /// Connect as soon as a viewer is mounted
    pub autoplay: bool,
    /// Start with local audio muted
    pub start_muted: bool,
    /// Delay before the automatic reconnect (milliseconds)
    pub reconnect_delay_ms: u64,
    /// Automatic reconnects before user action is required
    pub max_auto_reconnects: u32,
    /// Interval of the periodic surface statistics log (seconds, 0 = off)
    pub stats_interval_secs: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            start_muted: true,
            reconnect_delay_ms: 2000,
            max_auto_reconnects: 1,
            stats_interval_secs: 10,
        }
    }
}

impl ViewerConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            delay: Duration::from_millis(self.reconnect_delay_ms),
            max_automatic: self.max_auto_reconnects,
        }
    }
}
