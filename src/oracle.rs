// Oracle Client - Text completion over an Ollama-compatible HTTP API
// Callers bound each call with their own timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;

/// One completion request: system role plus user prompt
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens,
        }
    }
}

#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError>;

    /// Model name reported by health checks
    fn model(&self) -> &str;
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

// =============================================================================
// API CLIENT
// =============================================================================

pub struct OllamaClient {
    base_url: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: 0.1,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TextOracle for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
        let url = format!("{}/api/generate", self.base_url);

        let body = GenerateRequest {
            model: &self.model,
            system: &request.system,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OracleError::Status {
                status: response.status().as_u16(),
            });
        }

        let data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Decode(e.to_string()))?;

        tracing::debug!(model = %self.model, chars = data.response.len(), "Oracle completion received");
        Ok(data.response.trim().to_string())
    }

    fn model(&self) -> &str {
        &self.model
    }
}
