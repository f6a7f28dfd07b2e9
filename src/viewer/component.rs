//! Viewer component: one camera, one controller, one render sink

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ViewerContext;
use crate::error::StreamError;
use crate::events::{EventBus, ViewerEvent};
use crate::render::{DisplaySurface, PlaybackControls, RenderSink};
use crate::webrtc::controller::ConnectionController;
use crate::webrtc::session::{ConnectivityObservation, Session, SessionEvent, SessionState};
use crate::webrtc::target::StreamTarget;

/// Called with the target and error whenever a session fails
pub type ErrorHandler = Arc<dyn Fn(&StreamTarget, &StreamError) + Send + Sync>;

/// Live viewer of one stream target
///
/// Mounting connects right away (unless autoplay is off). Unmounting, or
/// dropping the component, leaves the controller `idle` whatever stage the
/// negotiation is in.
pub struct ViewerComponent {
    target: StreamTarget,
    controller: ConnectionController,
    sink: Arc<RenderSink>,
    cancel: CancellationToken,
    forwarder: Option<JoinHandle<()>>,
    mounted: bool,
}

impl ViewerComponent {
    /// Mount a viewer; must be called within a tokio runtime
    pub fn mount(target: StreamTarget, ctx: &ViewerContext, on_error: Option<ErrorHandler>) -> Self {
        let surface = (ctx.surfaces)(&target);
        let sink = Arc::new(RenderSink::new(
            surface,
            PlaybackControls {
                muted: ctx.viewer.start_muted,
                paused: false,
            },
        ));

        let controller = ConnectionController::new(
            target.clone(),
            ctx.factory.clone(),
            ctx.signaling.clone(),
            sink.clone(),
            ctx.viewer.reconnect_policy(),
        );

        let cancel = CancellationToken::new();
        let forwarder = tokio::spawn(forward_events(
            target.clone(),
            controller.subscribe(),
            ctx.events.clone(),
            on_error,
            cancel.clone(),
        ));

        ctx.events.publish(ViewerEvent::ViewerMounted {
            camera_id: target.camera_id.clone(),
            gateway_url: target.gateway_url.clone(),
        });
        info!("Viewer mounted: {} ({})", target.camera_id, target.gateway_url);

        if ctx.viewer.autoplay {
            controller.connect();
        }

        Self {
            target,
            controller,
            sink,
            cancel,
            forwarder: Some(forwarder),
            mounted: true,
        }
    }

    pub fn target(&self) -> &StreamTarget {
        &self.target
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn session(&self) -> Option<Session> {
        self.controller.session()
    }

    pub fn observation(&self) -> ConnectivityObservation {
        self.controller.observation()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectivityObservation> {
        self.controller.watch()
    }

    /// Overlay text: the error message if any, otherwise the state
    pub fn status_text(&self) -> String {
        self.observation().status_text()
    }

    pub fn controls(&self) -> PlaybackControls {
        self.sink.controls()
    }

    /// Toggle play/pause; returns `true` when now paused
    pub fn toggle_play(&self) -> bool {
        self.sink.toggle_pause()
    }

    /// Toggle mute; returns `true` when now muted
    pub fn toggle_mute(&self) -> bool {
        self.sink.toggle_mute()
    }

    pub fn set_paused(&self, paused: bool) {
        self.sink.set_paused(paused);
    }

    pub fn set_muted(&self, muted: bool) {
        self.sink.set_muted(muted);
    }

    pub fn surface(&self) -> &Arc<dyn DisplaySurface> {
        self.sink.surface()
    }

    /// Start a session from `idle` (when autoplay is off or after `disconnect`)
    pub fn connect(&self) -> bool {
        self.mounted && self.controller.connect()
    }

    /// User-triggered reconnect after a failure
    pub fn reconnect(&self) -> bool {
        self.mounted && self.controller.reconnect()
    }

    pub fn disconnect(&self) {
        self.controller.disconnect();
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Tear down the session and stop forwarding events; idempotent
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;

        self.controller.disconnect();
        self.cancel.cancel();
        // The forwarder drains and exits on its own after cancellation
        self.forwarder.take();
        info!("Viewer unmounted: {}", self.target.camera_id);
    }
}

impl Drop for ViewerComponent {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Republish controller events on the bus and report failures
async fn forward_events(
    target: StreamTarget,
    mut events: broadcast::Receiver<SessionEvent>,
    bus: Arc<EventBus>,
    on_error: Option<ErrorHandler>,
    cancel: CancellationToken,
) {
    let handle = |event: SessionEvent| {
        if let SessionEvent::StateChanged {
            error: Some(ref err),
            ..
        } = event
        {
            if err.is_user_visible() {
                if let Some(ref on_error) = on_error {
                    on_error(&target, err);
                }
            }
        }
        for viewer_event in ViewerEvent::from_session_event(&target.camera_id, &event) {
            bus.publish(viewer_event);
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // Events published by the final teardown are already queued
                while let Ok(event) = events.try_recv() {
                    handle(event);
                }
                break;
            }
            result = events.recv() => match result {
                Ok(event) => handle(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Viewer {} missed {} session events", target.camera_id, n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    bus.publish(ViewerEvent::ViewerUnmounted {
        camera_id: target.camera_id.clone(),
    });
    debug!("Viewer {} event forwarder stopped", target.camera_id);
}
