//! Viewers
//!
//! A [`ViewerComponent`] composes a connection controller and a render sink
//! for one camera; a [`ViewerGrid`] keeps one viewer per camera.

pub mod component;
pub mod grid;

pub use component::{ErrorHandler, ViewerComponent};
pub use grid::{GridChanges, ViewerGrid, ViewerStatus};

use std::sync::Arc;

use crate::config::{AppConfig, ViewerConfig};
use crate::error::Result;
use crate::events::EventBus;
use crate::render::{DisplaySurface, StatsSurface};
use crate::webrtc::peer::PeerTransportFactory;
use crate::webrtc::signaling::{signaling_client, SignalingClient};
use crate::webrtc::target::StreamTarget;
use crate::webrtc::transport::TransportFactory;

/// Creates the display surface of a newly mounted viewer
pub type SurfaceFactory = Arc<dyn Fn(&StreamTarget) -> Arc<dyn DisplaySurface> + Send + Sync>;

/// Collaborators shared by all viewers
#[derive(Clone)]
pub struct ViewerContext {
    pub viewer: ViewerConfig,
    pub factory: Arc<dyn TransportFactory>,
    pub signaling: Arc<dyn SignalingClient>,
    pub events: Arc<EventBus>,
    pub surfaces: SurfaceFactory,
}

impl ViewerContext {
    /// WebRTC transports and the configured signaling path; stats-only surfaces
    pub fn new(config: &AppConfig, events: Arc<EventBus>) -> Result<Self> {
        Ok(Self {
            viewer: config.viewer.clone(),
            factory: Arc::new(PeerTransportFactory::new(config.webrtc.clone())),
            signaling: signaling_client(&config.signaling)?,
            events,
            surfaces: Arc::new(|_: &StreamTarget| {
                Arc::new(StatsSurface::new()) as Arc<dyn DisplaySurface>
            }),
        })
    }

    pub fn with_surfaces(mut self, surfaces: SurfaceFactory) -> Self {
        self.surfaces = surfaces;
        self
    }
}
