//! Camera registry boundary
//!
//! The registry owns camera records; viewers only need a camera's ID and
//! the stream target derived from it.

pub mod client;
pub mod types;

pub use client::RegistryClient;
pub use types::{
    Camera, CameraCodec, CameraCreate, CameraInput, CameraStatus, CameraUpdate,
    ConnectionTestRequest, Resolution,
};
