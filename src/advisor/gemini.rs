use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{AdvisorError, CandidateChain, TextGenerator};
use crate::config::{is_configured_key, AdvisorConfig};

/// (API version, model) pairs tried in order; later entries cover regions and
/// keys where the newer aliases return 404
pub const DEFAULT_MODELS: [(&str, &str); 5] = [
    ("v1beta", "gemini-1.5-flash-latest"),
    ("v1beta", "gemini-1.5-flash"),
    ("v1", "gemini-1.5-flash"),
    ("v1", "gemini-pro"),
    ("v1beta", "gemini-pro"),
];

const MAX_OUTPUT_TOKENS: u32 = 300;
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Transport and decode failures without the request URL
fn unavailable(e: reqwest::Error) -> AdvisorError {
    AdvisorError::ServiceUnavailable(e.without_url().to_string())
}

/// One Gemini `generateContent` endpoint
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    api_version: String,
    model: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(client: Client, cfg: &AdvisorConfig, api_version: &str, model: &str) -> Self {
        Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
            model: model.to_string(),
            api_key: cfg.api_key.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, self.api_version, self.model
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiBackend {
    async fn generate(&self, prompt: &str) -> Result<String, AdvisorError> {
        if !is_configured_key(&self.api_key) {
            return Err(AdvisorError::Auth("Gemini API key not configured".to_string()));
        }

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.7,
                "topK": 40,
                "topP": 0.95,
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            }
        });

        debug!(model = %self.model, version = %self.api_version, "calling Gemini");
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AdvisorError::Auth(format!(
                "HTTP {} on {}: check the API key",
                status.as_u16(),
                self.model
            )));
        }
        if !status.is_success() {
            return Err(AdvisorError::ServiceUnavailable(format!(
                "HTTP {} on {}",
                status.as_u16(),
                self.model
            )));
        }

        let parsed: GenerateResponse = response.json().await.map_err(unavailable)?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| {
                AdvisorError::ServiceUnavailable(format!("empty candidate from {}", self.model))
            })
    }

    fn name(&self) -> String {
        format!("{}/{}", self.api_version, self.model)
    }
}

/// Chain over [`DEFAULT_MODELS`] sharing one HTTP client
pub fn default_chain(cfg: &AdvisorConfig) -> anyhow::Result<CandidateChain> {
    let client = Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_seconds))
        .build()?;
    let candidates = DEFAULT_MODELS
        .iter()
        .map(|(version, model)| {
            Arc::new(GeminiBackend::new(client.clone(), cfg, version, model))
                as Arc<dyn TextGenerator>
        })
        .collect();
    Ok(CandidateChain::new(candidates))
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain_order() {
        let chain = default_chain(&AdvisorConfig::default()).unwrap();
        assert_eq!(chain.len(), 5);
        assert_eq!(DEFAULT_MODELS[0], ("v1beta", "gemini-1.5-flash-latest"));
    }

    #[tokio::test]
    async fn test_missing_key_is_auth_error() {
        let backend = GeminiBackend::new(
            Client::new(),
            &AdvisorConfig::default(),
            "v1beta",
            "gemini-pro",
        );
        assert!(matches!(
            backend.generate("hi").await,
            Err(AdvisorError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_error_hides_key() {
        let cfg = AdvisorConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: "SECRETKEY123".to_string(),
            ..AdvisorConfig::default()
        };
        let backend = GeminiBackend::new(Client::new(), &cfg, "v1", "gemini-pro");
        let err = backend.generate("hi").await.unwrap_err();
        assert!(matches!(err, AdvisorError::ServiceUnavailable(_)));
        assert!(!err.to_string().contains("SECRETKEY123"));
    }

    #[test]
    fn test_endpoint() {
        let backend = GeminiBackend::new(
            Client::new(),
            &AdvisorConfig::default(),
            "v1",
            "gemini-pro",
        );
        assert_eq!(
            backend.endpoint(),
            "https://generativelanguage.googleapis.com/v1/models/gemini-pro:generateContent"
        );
        assert_eq!(backend.name(), "v1/gemini-pro");
    }
}
