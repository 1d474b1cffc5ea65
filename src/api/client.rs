//! HTTP client for the query, voice-catalog, and synthesis endpoints

use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::types::{
    ApiErrorBody, GenerateVoiceRequest, GenerateVoiceResponse, QueryRequest, QueryResponse, Voice,
};
use super::ApiError;

/// Global HTTP client for reuse across requests (avoids TLS handshake overhead)
static HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn http_client() -> &'static Client {
    HTTP_CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Client for the two backend services: the query API and the voice
/// service (catalog, synthesis, audio files).
#[derive(Debug, Clone)]
pub struct BackendClient {
    api_base: String,
    voice_base: String,
}

impl BackendClient {
    pub fn new(api_base: impl Into<String>, voice_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            voice_base: voice_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submit a text query.
    pub async fn query(&self, text: &str) -> Result<QueryResponse, ApiError> {
        debug!("Query: {} chars", text.len());

        let response = http_client()
            .post(format!("{}/api/v1/query/", self.api_base))
            .json(&QueryRequest {
                query: text.to_string(),
            })
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        read_json(response).await
    }

    /// Fetch the voice catalog.
    pub async fn voices(&self) -> Result<Vec<Voice>, ApiError> {
        let response = http_client()
            .get(format!("{}/voices", self.voice_base))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let voices: Vec<Voice> = read_json(response).await?;
        info!("Fetched {} voices", voices.len());
        Ok(voices)
    }

    /// Synthesize speech for a text. Returns an absolute URL for the
    /// generated audio, cache-busted so repeated generations refetch.
    pub async fn generate_voice(&self, text: &str, voice_id: &str) -> Result<String, ApiError> {
        debug!("Generating voice {} for {} chars", voice_id, text.len());

        let response = http_client()
            .post(format!("{}/generate-voice", self.voice_base))
            .json(&GenerateVoiceRequest {
                text: text.to_string(),
                voice_id: voice_id.to_string(),
            })
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let body: GenerateVoiceResponse = read_json(response).await?;
        Ok(self.resolve_audio_url(&body.audio_url))
    }

    /// Download synthesized audio for playback by the caller.
    pub async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = http_client()
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn resolve_audio_url(&self, path: &str) -> String {
        let absolute = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.voice_base, path)
        };
        format!("{}?t={}", absolute, Utc::now().timestamp_millis())
    }
}

/// Parse a successful body as JSON, or turn a non-OK status into
/// `ApiError::Api` using the `{error}` body when one is present.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    } else {
        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => body.error,
            Err(_) => text,
        };
        Err(ApiError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_urls_trimmed() {
        let client = BackendClient::new("http://localhost:8000/", "http://localhost:5001/");
        let url = client.resolve_audio_url("/output/voice.mp3");
        assert!(url.starts_with("http://localhost:5001/output/voice.mp3?t="));
    }

    #[test]
    fn test_resolve_relative_audio_url() {
        let client = BackendClient::new("http://localhost:8000", "http://localhost:5001");
        let url = client.resolve_audio_url("/clip.mp3");
        assert!(url.starts_with("http://localhost:5001/clip.mp3?t="));
    }

    #[test]
    fn test_resolve_absolute_audio_url() {
        let client = BackendClient::new("http://localhost:8000", "http://localhost:5001");
        let url = client.resolve_audio_url("http://cdn.example/clip.mp3");
        assert!(url.starts_with("http://cdn.example/clip.mp3?t="));
    }

    #[test]
    fn test_cache_buster_varies_format() {
        let client = BackendClient::new("http://localhost:8000", "http://localhost:5001");
        let url = client.resolve_audio_url("/clip.mp3");
        let (_, t) = url.split_once("?t=").unwrap();
        assert!(t.parse::<i64>().is_ok());
    }
}
