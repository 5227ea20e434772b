//! reqwest implementation of the backend seam

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use super::*;
use crate::settings::ArenaSettings;

/// Where the asset directory listing is served, relative to the base URL
const ASSET_LISTING_PATH: &str = "/list-glb-files.php";

/// HTTP client for the training service
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(settings: &ArenaSettings) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.backend_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get<T>(&self, path: &str) -> BackendFuture<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let request = self.client.get(join_url(&self.base_url, path));
        Box::pin(async move { parse_response(request.send().await?).await })
    }

    fn send_json<B, T>(&self, method: reqwest::Method, path: &str, body: &B) -> BackendFuture<T>
    where
        B: Serialize,
        T: DeserializeOwned + Send + 'static,
    {
        let request = self
            .client
            .request(method, join_url(&self.base_url, path))
            .json(body);
        Box::pin(async move { parse_response(request.send().await?).await })
    }

    /// Like `send_json` but ignores the response body
    fn send_unit<B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> BackendFuture<()> {
        let request = self
            .client
            .request(method, join_url(&self.base_url, path))
            .json(body);
        Box::pin(async move {
            let response = request.send().await?;
            check_status(response).await.map(|_| ())
        })
    }
}

impl ArenaBackend for HttpBackend {
    fn health(&self) -> BackendFuture<()> {
        let request = self.client.get(join_url(&self.base_url, "/health"));
        Box::pin(async move {
            let response = request.send().await?;
            check_status(response).await.map(|_| ())
        })
    }

    fn best_model(&self, fighter_id: u32) -> BackendFuture<Option<ModelInfo>> {
        self.get(&format!("/api/fighters/{fighter_id}/best-model"))
    }

    fn create_episode(&self, request: EpisodeCreate) -> BackendFuture<EpisodeCreated> {
        self.send_json(reqwest::Method::POST, "/api/episodes", &request)
    }

    fn complete_episode(&self, episode_id: u64, body: EpisodeComplete) -> BackendFuture<()> {
        self.send_unit(
            reqwest::Method::PATCH,
            &format!("/api/episodes/{episode_id}"),
            &body,
        )
    }

    fn submit_frame(&self, frame: FrameRecord) -> BackendFuture<()> {
        self.send_unit(reqwest::Method::POST, "/api/fight-frames", &frame)
    }

    fn infer(
        &self,
        fighter_id: u32,
        request: InferenceRequest,
    ) -> BackendFuture<InferenceResponse> {
        self.send_json(
            reqwest::Method::POST,
            &format!("/api/fighters/{fighter_id}/inference"),
            &request,
        )
    }

    fn list_profiles(&self, fighter_id: u32) -> BackendFuture<Vec<ProfileSummary>> {
        self.get(&format!("/api/fighter-profiles/{fighter_id}"))
    }

    fn fighter_stats(&self, fighter_id: u32) -> BackendFuture<FighterStats> {
        self.get(&format!("/api/fighters/{fighter_id}/stats"))
    }

    fn list_assets(&self) -> BackendFuture<Vec<String>> {
        self.get(ASSET_LISTING_PATH)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unavailable>".to_string());
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

async fn parse_response<T>(response: reqwest::Response) -> Result<T, BackendError>
where
    T: DeserializeOwned,
{
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Malformed(e.to_string()))
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://localhost:8001/", "/health"),
            "http://localhost:8001/health"
        );
        assert_eq!(
            join_url("http://localhost:8001", "api/episodes"),
            "http://localhost:8001/api/episodes"
        );
    }

    #[test]
    fn test_new_uses_settings_url() {
        let settings = ArenaSettings {
            backend_url: "http://arena.test:9000".into(),
            ..ArenaSettings::default()
        };
        let backend = HttpBackend::new(&settings).unwrap();
        assert_eq!(backend.base_url(), "http://arena.test:9000");
    }
}
