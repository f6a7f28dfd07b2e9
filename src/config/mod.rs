//! Configuration: schema and JSON-file store

pub mod schema;
pub mod store;

pub use schema::{AppConfig, RegistryConfig, SignalingConfig, ViewerConfig, WebRtcConfig};
pub use store::{ConfigChange, ConfigStore};
