//! Render sink: binds inbound media to a display surface

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use typeshare::typeshare;

use super::surface::DisplaySurface;
use crate::webrtc::transport::{InboundTrack, MediaChunk, MediaKind, TrackInfo};

/// Local playback toggles
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackControls {
    /// Local audio output muted
    pub muted: bool,
    /// Local rendering paused
    pub paused: bool,
}

#[derive(Default)]
struct Binding {
    /// Stream the sink is bound to (first one received)
    stream_id: Option<String>,
    tracks: Vec<TrackInfo>,
    forwarders: Vec<JoinHandle<()>>,
}

/// Binds the first inbound media stream to a display surface
///
/// Mute and pause only gate what reaches the surface. They never touch the
/// transport or the session state machine.
pub struct RenderSink {
    surface: Arc<dyn DisplaySurface>,
    binding: Mutex<Binding>,
    controls: watch::Sender<PlaybackControls>,
}

impl RenderSink {
    pub fn new(surface: Arc<dyn DisplaySurface>, controls: PlaybackControls) -> Self {
        surface.set_muted(controls.muted);
        surface.set_paused(controls.paused);
        let (controls, _) = watch::channel(controls);

        Self {
            surface,
            binding: Mutex::new(Binding::default()),
            controls,
        }
    }

    /// Bind an inbound track
    ///
    /// The first track decides the bound stream; later tracks of the same
    /// stream (audio next to video) are attached as well, tracks of other
    /// streams are dropped. Returns whether the track was bound.
    pub fn bind(&self, track: InboundTrack) -> bool {
        let InboundTrack { info, media } = track;
        let mut binding = self.binding.lock();

        let bound_elsewhere = binding
            .stream_id
            .as_deref()
            .filter(|bound| *bound != info.stream_id)
            .map(str::to_owned);
        if let Some(bound) = bound_elsewhere {
            debug!(
                "Ignoring track {} of stream {} (bound to {})",
                info.id, info.stream_id, bound
            );
            return false;
        }
        if binding.stream_id.is_none() {
            binding.stream_id = Some(info.stream_id.clone());
        }

        self.surface.attach(&info);
        let forwarder = tokio::spawn(forward_media(
            media,
            self.controls.subscribe(),
            self.surface.clone(),
        ));
        binding.forwarders.push(forwarder);

        info!(
            "Bound {} track {} ({}) to display surface",
            info.kind, info.id, info.codec
        );
        binding.tracks.push(info);
        true
    }

    /// Release all bound tracks; safe to call when nothing is bound
    pub fn unbind(&self) {
        let mut binding = self.binding.lock();
        if binding.stream_id.is_none() {
            return;
        }

        for forwarder in binding.forwarders.drain(..) {
            forwarder.abort();
        }
        binding.tracks.clear();
        binding.stream_id = None;
        self.surface.detach();
        debug!("Render sink unbound");
    }

    pub fn is_bound(&self) -> bool {
        self.binding.lock().stream_id.is_some()
    }

    pub fn bound_tracks(&self) -> Vec<TrackInfo> {
        self.binding.lock().tracks.clone()
    }

    pub fn controls(&self) -> PlaybackControls {
        *self.controls.borrow()
    }

    pub fn set_muted(&self, muted: bool) {
        let changed = self.controls.send_if_modified(|c| {
            if c.muted == muted {
                return false;
            }
            c.muted = muted;
            true
        });
        if changed {
            self.surface.set_muted(muted);
        }
    }

    pub fn set_paused(&self, paused: bool) {
        let changed = self.controls.send_if_modified(|c| {
            if c.paused == paused {
                return false;
            }
            c.paused = paused;
            true
        });
        if changed {
            self.surface.set_paused(paused);
        }
    }

    /// Toggle mute, returning the new value
    pub fn toggle_mute(&self) -> bool {
        let muted = !self.controls().muted;
        self.set_muted(muted);
        muted
    }

    /// Toggle pause, returning the new value
    pub fn toggle_pause(&self) -> bool {
        let paused = !self.controls().paused;
        self.set_paused(paused);
        paused
    }

    pub fn surface(&self) -> &Arc<dyn DisplaySurface> {
        &self.surface
    }
}

impl Drop for RenderSink {
    fn drop(&mut self) {
        for forwarder in self.binding.get_mut().forwarders.drain(..) {
            forwarder.abort();
        }
    }
}

/// Drain a track's media into the surface, honouring the playback toggles
///
/// Paused and muted chunks are consumed and dropped so the transport never
/// backs up behind the renderer.
async fn forward_media(
    mut media: mpsc::Receiver<MediaChunk>,
    controls: watch::Receiver<PlaybackControls>,
    surface: Arc<dyn DisplaySurface>,
) {
    while let Some(chunk) = media.recv().await {
        let PlaybackControls { muted, paused } = *controls.borrow();
        if paused || (muted && chunk.kind == MediaKind::Audio) {
            continue;
        }
        surface.present(&chunk);
    }
}
