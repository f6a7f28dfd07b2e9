//! camview - live WebRTC viewers for a camera dashboard
//!
//! Each viewer negotiates a receive-only session with a streaming gateway
//! (WHEP or the dashboard backend's offer endpoint), keeps it alive with a
//! single automatic reconnect and renders the inbound media to a display
//! surface.

pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod render;
pub mod utils;
pub mod viewer;
pub mod webrtc;

pub use error::{AppError, Result};
