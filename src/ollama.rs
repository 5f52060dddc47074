//! Client for a local Ollama server.
//!
//! Two endpoints are used:
//!
//! | Endpoint | Purpose |
//! |----------|---------|
//! | `POST /api/generate` | Non-streaming completion (`{model, prompt, stream: false}`) |
//! | `GET /api/tags` | Installed models |
//!
//! A non-2xx generate response is an [`ChatError::Api`] carrying the status
//! and the response body. Model listing never fails: any error is logged
//! and reported as an empty list.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::OllamaConfig;
use crate::error::{ChatError, Result};

/// The remote text-generation service, as seen by the session.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;

    /// Installed model names; empty on any failure.
    async fn list_models(&self) -> Vec<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

/// Older servers list bare names; newer ones list objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelEntry {
    Name(String),
    Detailed { name: String },
}

impl ModelEntry {
    fn into_name(self) -> String {
        match self {
            ModelEntry::Name(name) => name,
            ModelEntry::Detailed { name } => name,
        }
    }
}

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn network_error(&self, source: reqwest::Error) -> ChatError {
        ChatError::Network {
            url: self.base_url.clone(),
            source,
        }
    }

    async fn fetch_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = response.json().await.map_err(|e| self.network_error(e))?;
        Ok(parse_models(tags))
    }
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| self.network_error(e))?;
        debug!(model, chars = parsed.response.len(), "generation complete");
        Ok(parsed.response)
    }

    async fn list_models(&self) -> Vec<String> {
        match self.fetch_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!(error = %e, "failed to list Ollama models");
                Vec::new()
            }
        }
    }
}

fn parse_models(tags: TagsResponse) -> Vec<String> {
    tags.models.into_iter().map(ModelEntry::into_name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_models_accepts_strings_and_objects() {
        let tags: TagsResponse = serde_json::from_str(
            r#"{"models": ["llama3", {"name": "qwen3:8b", "size": 123}]}"#,
        )
        .unwrap();
        assert_eq!(parse_models(tags), vec!["llama3", "qwen3:8b"]);
    }

    #[test]
    fn test_parse_models_missing_field_is_empty() {
        let tags: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(parse_models(tags).is_empty());
    }

    #[test]
    fn test_generate_request_shape() {
        let body = GenerateRequest {
            model: "llama3",
            prompt: "hi",
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "llama3", "prompt": "hi", "stream": false})
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = OllamaClient::new(&OllamaConfig {
            server_url: "http://localhost:11434/".to_string(),
            model: "m".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_unreachable_server_lists_no_models() {
        let client = OllamaClient::new(&OllamaConfig {
            server_url: "http://127.0.0.1:9".to_string(),
            model: "m".to_string(),
            timeout_secs: 2,
        })
        .unwrap();
        assert!(client.list_models().await.is_empty());
        assert!(matches!(
            client.generate("m", "hi").await,
            Err(ChatError::Network { .. })
        ));
    }
}
