//! Stream targets and gateway endpoint resolution

use reqwest::Url;
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::error::{StreamError, StreamResult};

/// A camera's media endpoint
///
/// Immutable for the lifetime of one viewing session. A viewer whose target
/// changes must be torn down and mounted again.
#[typeshare]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamTarget {
    /// Stable camera identifier from the registry
    pub camera_id: String,
    /// Base URL of the signaling endpoint (may embed path and credentials)
    pub gateway_url: String,
}

impl StreamTarget {
    pub fn new(camera_id: impl Into<String>, gateway_url: impl Into<String>) -> Self {
        Self {
            camera_id: camera_id.into(),
            gateway_url: gateway_url.into(),
        }
    }

    /// Derive the target of a registry camera: `{gateway_base}/{camera_id}`
    pub fn for_camera(camera_id: &str, gateway_base: &str) -> Self {
        let gateway_url = format!(
            "{}/{}",
            gateway_base.trim_end_matches('/'),
            urlencoding::encode(camera_id)
        );
        Self::new(camera_id, gateway_url)
    }

    /// Resolve the HTTP endpoint that receives the offer
    ///
    /// `webrtc://` and `webrtcs://` URLs are rewritten to `http://` and
    /// `https://`. `sub_path` is appended unless the URL already ends with
    /// it. User-info is moved out of the URL into [`GatewayEndpoint::credentials`].
    pub fn resolve(&self, sub_path: Option<&str>) -> StreamResult<GatewayEndpoint> {
        let raw = self.gateway_url.trim();
        let rewritten = if let Some(rest) = raw.strip_prefix("webrtcs://") {
            format!("https://{}", rest)
        } else if let Some(rest) = raw.strip_prefix("webrtc://") {
            format!("http://{}", rest)
        } else {
            raw.to_string()
        };

        let mut url = Url::parse(&rewritten).map_err(|e| {
            StreamError::SignalingFailure(format!("Invalid gateway URL '{}': {}", raw, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(StreamError::SignalingFailure(format!(
                "Unsupported gateway URL scheme: {}",
                url.scheme()
            )));
        }

        let credentials = if url.username().is_empty() {
            None
        } else {
            let username = decode_component(url.username());
            let password = url.password().map(decode_component);
            let _ = url.set_username("");
            let _ = url.set_password(None);
            Some(Credentials { username, password })
        };

        if let Some(sub_path) = sub_path.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
            let path = url.path().trim_end_matches('/').to_string();
            let already_there = path
                .rsplit('/')
                .next()
                .is_some_and(|last| last == sub_path);
            if already_there {
                url.set_path(&path);
            } else {
                url.set_path(&format!("{}/{}", path, sub_path));
            }
        }

        Ok(GatewayEndpoint { url, credentials })
    }
}

impl std::fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.camera_id, self.gateway_url)
    }
}

/// Basic-auth credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// Resolved signaling endpoint
#[derive(Debug, Clone)]
pub struct GatewayEndpoint {
    /// Request URL, without user-info
    pub url: Url,
    /// Credentials that were embedded in the gateway URL
    pub credentials: Option<Credentials>,
}

fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_camera_encodes_id() {
        let target = StreamTarget::for_camera("front door", "http://gw:8889/");
        assert_eq!(target.gateway_url, "http://gw:8889/front%20door");
        assert_eq!(target.camera_id, "front door");
    }

    #[test]
    fn test_resolve_rewrites_scheme_and_appends_whep() {
        let target = StreamTarget::new("cam1", "webrtc://192.168.1.10:8889/cam1");
        let endpoint = target.resolve(Some("whep")).unwrap();
        assert_eq!(endpoint.url.as_str(), "http://192.168.1.10:8889/cam1/whep");
        assert!(endpoint.credentials.is_none());

        let secure = StreamTarget::new("cam1", "webrtcs://gw.example.com/cam1");
        let endpoint = secure.resolve(None).unwrap();
        assert_eq!(endpoint.url.as_str(), "https://gw.example.com/cam1");
    }

    #[test]
    fn test_resolve_does_not_duplicate_sub_path() {
        let target = StreamTarget::new("cam1", "http://gw:8889/cam1/whep/");
        let endpoint = target.resolve(Some("/whep")).unwrap();
        assert_eq!(endpoint.url.path(), "/cam1/whep");
    }

    #[test]
    fn test_resolve_extracts_credentials() {
        let target = StreamTarget::new("cam1", "http://admin:p%40ss@gw:8889/cam1");
        let endpoint = target.resolve(Some("whep")).unwrap();
        assert_eq!(endpoint.url.as_str(), "http://gw:8889/cam1/whep");
        assert_eq!(
            endpoint.credentials,
            Some(Credentials {
                username: "admin".to_string(),
                password: Some("p@ss".to_string()),
            })
        );
    }

    #[test]
    fn test_resolve_rejects_invalid_urls() {
        let target = StreamTarget::new("cam1", "not a url");
        assert!(matches!(
            target.resolve(None),
            Err(StreamError::SignalingFailure(_))
        ));

        let rtsp = StreamTarget::new("cam1", "rtsp://cam/stream1");
        assert!(matches!(
            rtsp.resolve(None),
            Err(StreamError::SignalingFailure(_))
        ));
    }
}
