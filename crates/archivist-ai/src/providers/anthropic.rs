//! Thin typed client for Anthropic's Messages API. Supports `analyze` directly; `extract_text` and
//! `embed` are not in this vendor's capability set, so
//! [`AnthropicProvider::capabilities`] only advertises `analyze`.

use crate::error::{AiError, Result};
use crate::provider::{AiProvider, Capabilities, ExtractedText, HintType};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const API_BASE: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL)
    }

    pub fn with_model(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client builds");
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            extract: false,
            analyze: true,
            embed: false,
        }
    }

    async fn extract_text(&self, _bytes: &[u8], _hint_type: HintType) -> Result<ExtractedText> {
        Err(AiError::ProviderUnavailable("anthropic does not support extract_text".into()))
    }

    async fn analyze_raw(&self, text: &str, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": 1024,
            "messages": [
                {"role": "user", "content": format!("{prompt}\n\nDocument text:\n{text}")}
            ],
        });

        let response = self
            .client
            .post(API_BASE)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AiError::RateLimited { retry_after_s: 5 });
        }
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AiError::Unauthorized("anthropic rejected the API key".into()));
        }
        if response.status() == reqwest::StatusCode::PAYMENT_REQUIRED {
            return Err(AiError::QuotaExhausted("anthropic account quota exhausted".into()));
        }
        if !response.status().is_success() {
            return Err(AiError::Transient(format!("anthropic returned {}", response.status())));
        }

        let parsed: serde_json::Value = response.json().await?;
        parsed["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AiError::MalformedResponse("anthropic response missing content[0].text".into()))
    }

    async fn embed(&self, _text: &str, _dim: usize) -> Result<Vec<f32>> {
        Err(AiError::ProviderUnavailable("anthropic does not support embed".into()))
    }
}
