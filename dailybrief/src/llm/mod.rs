use thiserror::Error;

/// Core trait for generative model backends
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a given prompt on the requested model
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, GenerationError>;
}

/// Request structure for LLM generation
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub prompt: String,
    pub timeout_seconds: Option<u64>,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            timeout_seconds: None,
        }
    }
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Classified provider failure
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Rate limit or exhausted quota (429)
    #[error("quota exceeded for {model}: {message}")]
    Quota { model: String, message: String },

    /// Unknown or retired model (404)
    #[error("model {model} not found: {message}")]
    ModelNotFound { model: String, message: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GenerationError {
    /// Classifies an HTTP status plus response body. Without a status (transport-level or
    /// SDK-style errors) the text is matched on an embedded "429" / "404".
    pub fn classify(model: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let code = status.or_else(|| {
            if message.contains("429") {
                Some(429)
            } else if message.contains("404") {
                Some(404)
            } else {
                None
            }
        });

        match code {
            Some(429) => GenerationError::Quota {
                model: model.to_string(),
                message,
            },
            Some(404) => GenerationError::ModelNotFound {
                model: model.to_string(),
                message,
            },
            _ => match status {
                Some(status) => GenerationError::Other(anyhow::anyhow!(
                    "API error {} for {}: {}",
                    status,
                    model,
                    message
                )),
                None => GenerationError::Other(anyhow::anyhow!("{}", message)),
            },
        }
    }

    /// Quota and not-found failures move on to the next model; anything else stops the loop.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            GenerationError::Quota { .. } | GenerationError::ModelNotFound { .. }
        )
    }
}

pub mod gemini;
pub mod summarizer;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_take_precedence() {
        assert!(matches!(
            GenerationError::classify("m", Some(429), "slow down"),
            GenerationError::Quota { .. }
        ));
        assert!(matches!(
            GenerationError::classify("m", Some(404), "gone"),
            GenerationError::ModelNotFound { .. }
        ));
        assert!(matches!(
            GenerationError::classify("m", Some(500), "boom"),
            GenerationError::Other(_)
        ));
    }

    #[test]
    fn codes_embedded_in_text_are_recognised() {
        let quota = GenerationError::classify("m", None, "429 quota exceeded");
        assert!(quota.is_fallback_eligible());
        assert!(matches!(quota, GenerationError::Quota { .. }));

        let missing = GenerationError::classify("m", None, "404 models/foo is not found");
        assert!(matches!(missing, GenerationError::ModelNotFound { .. }));

        let other = GenerationError::classify("m", None, "connection reset");
        assert!(!other.is_fallback_eligible());
        assert_eq!(other.to_string(), "connection reset");
    }
}
