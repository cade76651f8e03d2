// Summarizer module
use chrono::NaiveDate;
use common::LlmConfig;
use thiserror::Error;
use tracing::{info, warn};

use super::{GenerationError, LlmProvider, LlmRequest};

/// Report text used when every candidate model failed with a fallback-eligible error.
pub const ALL_MODELS_FAILED: &str = "❌ 모든 가용 모델의 호출에 실패했습니다.";

/// Successful analysis and the model that produced it
#[derive(Debug, Clone)]
pub struct Analysis {
    pub model: String,
    pub text: String,
}

/// Why no analysis was produced
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// Every model was rate limited or unknown
    #[error("{}", ALL_MODELS_FAILED)]
    Exhausted { attempts: Vec<GenerationError> },

    /// A non-recoverable failure stopped the fallback loop
    #[error("❌ API 호출 중 예외 발생: {source}")]
    Aborted { model: String, source: GenerationError },
}

/// Prompted multi-model summarizer with ordered fallback
#[derive(Debug, Clone)]
pub struct Summarizer {
    models: Vec<String>,
    prompt_template: String,
    brief_model: String,
    brief_template: String,
}

impl Summarizer {
    pub fn new(models: Vec<String>, prompt_template: impl Into<String>) -> Self {
        let defaults = LlmConfig::default();
        Self {
            models,
            prompt_template: prompt_template.into(),
            brief_model: defaults.brief_model,
            brief_template: defaults.brief_template,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            models: config.model_priority.clone(),
            prompt_template: config.prompt_template.clone(),
            brief_model: config.brief_model.clone(),
            brief_template: config.brief_template.clone(),
        }
    }

    pub fn with_brief(mut self, model: impl Into<String>, template: impl Into<String>) -> Self {
        self.brief_model = model.into();
        self.brief_template = template.into();
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Substitutes `{date}` (as `YYYY년 MM월 DD일`) and `{news}`.
    pub fn render_prompt(&self, news_text: &str, date: NaiveDate) -> String {
        self.prompt_template
            .replace("{date}", &date.format("%Y년 %m월 %d일").to_string())
            .replace("{news}", news_text)
    }

    /// Tries each model in priority order. The first success wins; quota and not-found
    /// errors move on to the next model; any other error stops the loop.
    pub async fn summarize<P: LlmProvider + ?Sized>(
        &self,
        provider: &P,
        news_text: &str,
        date: NaiveDate,
    ) -> Result<Analysis, SummarizeError> {
        let prompt = self.render_prompt(news_text, date);
        let mut attempts = Vec::new();

        for model in &self.models {
            info!("summarizer: requesting analysis from {}", model);
            match provider.generate(LlmRequest::new(model.as_str(), prompt.as_str())).await {
                Ok(response) => {
                    info!(
                        "summarizer: {} answered with {} chars, {} tokens",
                        model,
                        response.content.len(),
                        response.usage.total_tokens
                    );
                    return Ok(Analysis {
                        model: model.clone(),
                        text: response.content,
                    });
                }
                Err(e) if e.is_fallback_eligible() => {
                    warn!("summarizer: {} unavailable ({}), trying next model", model, e);
                    attempts.push(e);
                }
                Err(e) => {
                    warn!("summarizer: {} failed, not trying further models: {}", model, e);
                    return Err(SummarizeError::Aborted {
                        model: model.clone(),
                        source: e,
                    });
                }
            }
        }

        Err(SummarizeError::Exhausted { attempts })
    }

    /// Short chat teaser from the dedicated brief model.
    pub async fn brief<P: LlmProvider + ?Sized>(
        &self,
        provider: &P,
        news_text: &str,
    ) -> Result<String, GenerationError> {
        let prompt = self.brief_template.replace("{news}", news_text);
        let response = provider
            .generate(LlmRequest::new(self.brief_model.as_str(), prompt))
            .await?;
        Ok(response.content.trim().to_string())
    }
}
