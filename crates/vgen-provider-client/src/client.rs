//! Generation API HTTP client.

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::types::{error_message_from_body, GenerationPayload, GenerationResponse};

/// Configuration for the generation client.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Full URL of the generation endpoint
    pub endpoint: Option<String>,
    /// Bearer token sent with each request
    pub api_key: Option<String>,
    /// Request timeout. None waits for the provider indefinitely.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("GENERATION_API_URL")
                .ok()
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),
            api_key: std::env::var("GENERATION_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            timeout: std::env::var("GENERATION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    /// Config pointing at a fixed endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }
}

/// Client for the external generation endpoint.
pub struct GenerationClient {
    http: Client,
    config: ClientConfig,
}

impl GenerationClient {
    /// Create a new generation client.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ClientError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn is_configured(&self) -> bool {
        self.config.endpoint.is_some()
    }

    /// Submit one generation request.
    ///
    /// Any non-2xx status is a failure; no retries are attempted.
    pub async fn generate(&self, payload: GenerationPayload) -> ClientResult<GenerationResponse> {
        let url = self
            .config
            .endpoint
            .as_deref()
            .ok_or(ClientError::NotConfigured)?;

        let provider = payload.provider.clone();
        let has_image = payload.reference_image.is_some();
        let form = payload.into_multipart()?;

        debug!(provider = %provider, has_image, "Sending generation request to {}", url);
        let start = Instant::now();

        let mut request = self.http.post(url).multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message_from_body(&body)
                .unwrap_or_else(|| format!("Generation failed with status {}", status.as_u16()));
            warn!(
                provider = %provider,
                status = status.as_u16(),
                "Generation request failed: {}",
                message
            );
            return Err(ClientError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed: GenerationResponse = serde_json::from_str(&body)
            .map_err(|e| ClientError::InvalidResponse(format!("{}: {}", e, truncate(&body, 200))))?;

        info!(
            provider = %provider,
            videos = parsed.videos.len(),
            cost = ?parsed.cost,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Generation request completed"
        );

        Ok(parsed)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::{FormState, ProviderCatalog, ReferenceImage};
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> GenerationPayload {
        let catalog = ProviderCatalog::builtin();
        let mut form = FormState::for_provider(catalog.get("veo3").unwrap());
        form.prompt = "a paper boat in the rain".to_string();
        form.video_count = 2;
        GenerationPayload::from_form(&form)
    }

    fn client_for(server: &MockServer) -> GenerationClient {
        GenerationClient::new(ClientConfig {
            endpoint: Some(format!("{}/generate", server.uri())),
            api_key: Some("test-key".to_string()),
            timeout: None,
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert!(config.endpoint.is_none());
        assert!(config.timeout.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_client_fails_fast() {
        let client = GenerationClient::new(ClientConfig::default()).unwrap();
        assert!(!client.is_configured());
        let err = client.generate(payload()).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConfigured));
    }

    #[tokio::test]
    async fn test_success_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_string_contains("a paper boat in the rain"))
            .and(body_string_contains("name=\"video_count\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "videos": ["a.mp4", "b.mp4"],
                "provider": "veo3",
                "cost": 1.50
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).generate(payload()).await.unwrap();
        assert_eq!(response.videos, vec!["a.mp4".to_string(), "b.mp4".to_string()]);
        assert_eq!(response.provider.as_deref(), Some("veo3"));
        assert_eq!(response.cost, Some(1.50));
    }

    #[tokio::test]
    async fn test_reference_image_sent_as_file_part() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(body_string_contains("filename=\"ref.png\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "videos": ["a.mp4"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut payload = payload();
        payload.reference_image = Some(ReferenceImage::new("ref.png", "image/png", b"png".to_vec()));
        let response = client_for(&server).generate(payload).await.unwrap();
        assert_eq!(response.cost, None);
    }

    #[tokio::test]
    async fn test_non_success_uses_body_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(402)
                    .set_body_json(serde_json::json!({ "error": "Insufficient credits" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).generate(payload()).await.unwrap_err();
        assert_eq!(err.status(), Some(402));
        assert_eq!(err.user_message(), "Insufficient credits");
    }

    #[tokio::test]
    async fn test_non_success_without_body_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let err = client_for(&server).generate(payload()).await.unwrap_err();
        assert_eq!(err.user_message(), "Generation failed with status 500");
    }

    #[tokio::test]
    async fn test_invalid_json_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).generate(payload()).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }
}
