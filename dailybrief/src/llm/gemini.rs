use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GenerationError, LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

/// Provider for the Gemini `generateContent` REST API.
/// The model is chosen per request so one client serves the whole fallback list.
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    default_timeout: Duration,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            default_timeout: Duration::from_secs(120),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(mut self, timeout_secs: u64) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self
    }

    fn model_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model_id(model)
        )
    }

    /// Lists models that support `generateContent`, following pagination.
    pub async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>> {
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header("x-goog-api-key", &self.api_key)
                .timeout(self.default_timeout);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await.context("model listing request failed")?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("model listing failed {}: {}", status, body);
            }

            let page: ListModelsResponse = response
                .json()
                .await
                .context("Failed to parse model listing")?;
            models.extend(
                page.models
                    .into_iter()
                    .filter(|m| m.supported_generation_methods.iter().any(|g| g == "generateContent")),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }
}

/// Classifies a failed send. The URL embeds the model id, so it is left out
/// of the text searched for status codes.
fn transport_error(model: &str, e: reqwest::Error) -> GenerationError {
    let status = e.status().map(|s| s.as_u16());
    let mut causes = Vec::new();
    let mut source = std::error::Error::source(&e);
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    let mut message = e.without_url().to_string();
    for cause in causes {
        message.push_str(": ");
        message.push_str(&cause);
    }
    GenerationError::classify(model, status, message)
}

/// Accepts both `gemma-3-27b-it` and `models/gemma-3-27b-it`.
pub fn model_id(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, GenerationError> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);
        let model = request.model;

        let req_body = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(request.prompt),
                }],
            }],
        };

        // The deadline covers both the request and reading the body
        let exchange = async {
            let response = self
                .client
                .post(self.model_url(&model))
                .header("x-goog-api-key", &self.api_key)
                .json(&req_body)
                .send()
                .await
                .map_err(|e| transport_error(&model, e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ErrorEnvelope>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(GenerationError::classify(&model, Some(status.as_u16()), message));
            }

            let body: GenerateResponse = response
                .json()
                .await
                .context("Failed to parse LLM response")?;
            Ok::<_, GenerationError>(body)
        };

        let resp_body = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| GenerationError::Other(anyhow::anyhow!("LLM request to {} timed out", model)))??;

        let candidate = resp_body
            .candidates
            .first()
            .context("LLM response has no candidates")?;

        let content: String = candidate
            .content
            .as_ref()
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(GenerationError::Other(anyhow::anyhow!(
                "LLM response from {} has no text (finish reason: {})",
                model,
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let usage = resp_body
            .usage_metadata
            .map(|u| UsageMetadata {
                prompt_tokens: u.prompt_token_count.unwrap_or(0),
                completion_tokens: u.candidates_token_count.unwrap_or(0),
                total_tokens: u.total_token_count.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage,
            model: resp_body.model_version.unwrap_or(model),
        })
    }
}

// Gemini API request/response structures
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<Usage>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Usage {
    prompt_token_count: Option<usize>,
    candidates_token_count: Option<usize>,
    total_token_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}

/// Entry of the model listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}
