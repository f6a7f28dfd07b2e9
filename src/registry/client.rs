//! HTTP client for the camera registry API

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{Camera, CameraCreate, CameraUpdate, ConnectionTestRequest, ErrorDetail};
use crate::error::{AppError, Result};

/// Camera registry client (`{base}/api/v1/cameras...`)
#[derive(Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/cameras{}", self.base_url, path)
    }

    fn camera_url(&self, id: &str) -> String {
        self.url(&format!("/{}", urlencoding::encode(id)))
    }

    /// List all cameras
    pub async fn list_cameras(&self) -> Result<Vec<Camera>> {
        let response = self.http.get(self.url("")).send().await?;
        let cameras: Vec<Camera> = parse(response).await?;
        debug!("Registry returned {} cameras", cameras.len());
        Ok(cameras)
    }

    /// Get one camera; unknown IDs are `AppError::NotFound`
    pub async fn get_camera(&self, id: &str) -> Result<Camera> {
        let response = self.http.get(self.camera_url(id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Camera {}", id)));
        }
        parse(response).await
    }

    pub async fn create_camera(&self, camera: &CameraCreate) -> Result<Camera> {
        camera.validate().map_err(AppError::BadRequest)?;
        let response = self.http.post(self.url("")).json(camera).send().await?;
        parse(response).await
    }

    pub async fn update_camera(&self, id: &str, camera: &CameraUpdate) -> Result<Camera> {
        camera.validate().map_err(AppError::BadRequest)?;
        let response = self.http.put(self.camera_url(id)).json(camera).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Camera {}", id)));
        }
        parse(response).await
    }

    pub async fn delete_camera(&self, id: &str) -> Result<()> {
        let response = self.http.delete(self.camera_url(id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Camera {}", id)));
        }
        check(response).await?;
        Ok(())
    }

    /// Ask the registry to probe an RTSP source
    pub async fn test_connection(&self, request: &ConnectionTestRequest) -> Result<()> {
        let response = self
            .http
            .post(self.url("/test-connection"))
            .json(request)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

/// Map non-success responses to `AppError::Registry`, using `detail` when present
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorDetail>(&body)
        .map(|e| e.detail)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            }
        });

    Err(AppError::Registry {
        status: status.as_u16(),
        message,
    })
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check(response).await?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::{CameraCodec, CameraInput, CameraStatus, Resolution};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn camera_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": "Lobby",
            "ip_address": "10.0.0.5",
            "rtsp_url": "rtsp://10.0.0.5/live",
            "resolution": { "width": 1920, "height": 1080 },
            "fps": 30,
            "codec": "H.264",
            "status": "offline",
            "last_seen": null
        })
    }

    fn input() -> CameraInput {
        CameraInput {
            name: "Lobby".to_string(),
            ip_address: "10.0.0.5".to_string(),
            rtsp_url: "rtsp://10.0.0.5/live".to_string(),
            resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            fps: 30,
            codec: CameraCodec::H264,
        }
    }

    #[tokio::test]
    async fn test_list_cameras() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/cameras"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                camera_json("a"),
                camera_json("b")
            ])))
            .mount(&server)
            .await;

        let client = RegistryClient::new(reqwest::Client::new(), server.uri());
        let cameras = client.list_cameras().await.unwrap();
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[1].id, "b");
        assert_eq!(cameras[0].status, CameraStatus::Offline);
    }

    #[tokio::test]
    async fn test_get_missing_camera() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/cameras/nope"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "detail": "Camera not found" })),
            )
            .mount(&server)
            .await;

        let client = RegistryClient::new(reqwest::Client::new(), server.uri());
        let err = client.get_camera("nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/cameras"))
            .and(body_json(json!({
                "name": "Lobby",
                "ip_address": "10.0.0.5",
                "rtsp_url": "rtsp://10.0.0.5/live",
                "resolution": { "width": 1920, "height": 1080 },
                "fps": 30,
                "codec": "H.264"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(camera_json("new")))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/cameras/new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(camera_json("new")))
            .mount(&server)
            .await;

        let client = RegistryClient::new(reqwest::Client::new(), format!("{}/", server.uri()));
        let created = client.create_camera(&input()).await.unwrap();
        assert_eq!(created.id, "new");

        let updated = client.update_camera("new", &input()).await.unwrap();
        assert_eq!(updated.name, "Lobby");
    }

    #[tokio::test]
    async fn test_invalid_input_is_not_sent() {
        let server = MockServer::start().await;
        let client = RegistryClient::new(reqwest::Client::new(), server.uri());

        let mut bad = input();
        bad.fps = 120;
        let err = client.create_camera(&bad).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_camera() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/cameras/a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
            .mount(&server)
            .await;

        let client = RegistryClient::new(reqwest::Client::new(), server.uri());
        tokio_test::assert_ok!(client.delete_camera("a").await);
        assert!(matches!(
            client.delete_camera("b").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_connection_failure_carries_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/cameras/test-connection"))
            .and(body_json(json!({ "rtsp_url": "rtsp://10.0.0.9/live", "username": "admin" })))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "detail": "Could not open RTSP stream" })),
            )
            .mount(&server)
            .await;

        let client = RegistryClient::new(reqwest::Client::new(), server.uri());
        let err = client
            .test_connection(&ConnectionTestRequest {
                rtsp_url: "rtsp://10.0.0.9/live".to_string(),
                username: Some("admin".to_string()),
                password: None,
            })
            .await
            .unwrap_err();

        match err {
            AppError::Registry { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Could not open RTSP stream");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
