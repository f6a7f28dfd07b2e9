//! Camera registry records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::webrtc::target::StreamTarget;

/// Capture resolution
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Camera video codec
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraCodec {
    #[serde(rename = "H.264")]
    H264,
    #[serde(rename = "H.265")]
    H265,
}

/// Camera reachability as reported by the registry
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    Online,
    Offline,
    Error,
}

/// Camera record
#[typeshare]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub id: String,
    pub name: String,
    pub ip_address: String,
    pub rtsp_url: String,
    pub resolution: Resolution,
    pub fps: u32,
    pub codec: CameraCodec,
    pub status: CameraStatus,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl Camera {
    /// Stream target of this camera on the given media gateway
    pub fn stream_target(&self, gateway_base_url: &str) -> StreamTarget {
        StreamTarget::for_camera(&self.id, gateway_base_url)
    }
}

/// Camera fields accepted on create and update
#[typeshare]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraInput {
    pub name: String,
    pub ip_address: String,
    pub rtsp_url: String,
    pub resolution: Resolution,
    /// 1-60
    pub fps: u32,
    pub codec: CameraCodec,
}

pub type CameraCreate = CameraInput;
pub type CameraUpdate = CameraInput;

impl CameraInput {
    /// Local validation mirroring the registry's field limits
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if !(1..=60).contains(&self.fps) {
            return Err(format!("fps must be between 1 and 60, got {}", self.fps));
        }
        if !(1..=3840).contains(&self.resolution.width) || !(1..=2160).contains(&self.resolution.height) {
            return Err(format!("resolution {} exceeds 3840x2160", self.resolution));
        }
        Ok(())
    }
}

/// Body of `POST /cameras/test-connection`
#[typeshare]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestRequest {
    pub rtsp_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Error body returned by the registry API
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}
