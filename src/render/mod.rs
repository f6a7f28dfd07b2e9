//! Rendering of inbound media
//!
//! The render sink binds the first inbound stream of a session to a
//! [`DisplaySurface`] and applies the local mute/pause toggles.

pub mod sink;
pub mod surface;

pub use sink::{PlaybackControls, RenderSink};
pub use surface::{DisplaySurface, StatsSurface, SurfaceStats};
