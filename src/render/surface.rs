//! Display surfaces

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::webrtc::transport::{MediaChunk, MediaKind, TrackInfo};

/// Where bound media ends up
///
/// Decoding and presentation belong to the platform media pipeline; a
/// surface only receives the chunks the render sink lets through.
pub trait DisplaySurface: Send + Sync {
    /// A track was bound to this surface
    fn attach(&self, track: &TrackInfo);

    /// Present one chunk of media
    fn present(&self, chunk: &MediaChunk);

    /// Local audio output muted/unmuted
    fn set_muted(&self, _muted: bool) {}

    /// Local rendering paused/resumed
    fn set_paused(&self, _paused: bool) {}

    /// All tracks were unbound
    fn detach(&self);
}

/// Surface statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SurfaceStats {
    pub video_chunks: u64,
    pub video_bytes: u64,
    /// Completed video frames (RTP marker bit)
    pub video_frames: u64,
    pub audio_chunks: u64,
    pub audio_bytes: u64,
    pub attached_tracks: usize,
    pub muted: bool,
    pub paused: bool,
}

/// Surface that counts what would have been displayed
#[derive(Default)]
pub struct StatsSurface {
    video_chunks: AtomicU64,
    video_bytes: AtomicU64,
    video_frames: AtomicU64,
    audio_chunks: AtomicU64,
    audio_bytes: AtomicU64,
    attached: Mutex<Vec<TrackInfo>>,
    muted: AtomicBool,
    paused: AtomicBool,
}

impl StatsSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> SurfaceStats {
        SurfaceStats {
            video_chunks: self.video_chunks.load(Ordering::Relaxed),
            video_bytes: self.video_bytes.load(Ordering::Relaxed),
            video_frames: self.video_frames.load(Ordering::Relaxed),
            audio_chunks: self.audio_chunks.load(Ordering::Relaxed),
            audio_bytes: self.audio_bytes.load(Ordering::Relaxed),
            attached_tracks: self.attached.lock().len(),
            muted: self.muted.load(Ordering::Relaxed),
            paused: self.paused.load(Ordering::Relaxed),
        }
    }

    pub fn attached_tracks(&self) -> Vec<TrackInfo> {
        self.attached.lock().clone()
    }
}

impl DisplaySurface for StatsSurface {
    fn attach(&self, track: &TrackInfo) {
        self.attached.lock().push(track.clone());
    }

    fn present(&self, chunk: &MediaChunk) {
        let bytes = chunk.payload.len() as u64;
        match chunk.kind {
            MediaKind::Video => {
                self.video_chunks.fetch_add(1, Ordering::Relaxed);
                self.video_bytes.fetch_add(bytes, Ordering::Relaxed);
                if chunk.marker {
                    self.video_frames.fetch_add(1, Ordering::Relaxed);
                }
            }
            MediaKind::Audio => {
                self.audio_chunks.fetch_add(1, Ordering::Relaxed);
                self.audio_bytes.fetch_add(bytes, Ordering::Relaxed);
            }
        }
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    fn detach(&self) {
        self.attached.lock().clear();
    }
}
