//! Thin typed client for OpenAI's Chat Completions and Embeddings APIs
//!. Supports `analyze` and `embed`; text
//! extraction (PDF/OCR) is not this vendor's job here, so `extract_text`
//! is unsupported.

use crate::error::{AiError, Result};
use crate::provider::{AiProvider, Capabilities, ExtractedText, HintType};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    embedding_model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client builds");
        Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    fn classify_status(status: reqwest::StatusCode) -> Option<AiError> {
        match status.as_u16() {
            429 => Some(AiError::RateLimited { retry_after_s: 5 }),
            401 => Some(AiError::Unauthorized("openai rejected the API key".into())),
            402 | 403 => Some(AiError::QuotaExhausted("openai account quota exhausted".into())),
            s if s >= 500 => Some(AiError::Transient(format!("openai returned {s}"))),
            _ => None,
        }
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            extract: false,
            analyze: true,
            embed: true,
        }
    }

    async fn extract_text(&self, _bytes: &[u8], _hint_type: HintType) -> Result<ExtractedText> {
        Err(AiError::ProviderUnavailable("openai does not support extract_text".into()))
    }

    async fn analyze_raw(&self, text: &str, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt},
                {"role": "user", "content": text},
            ],
            "temperature": 0.2,
        });

        let response = self
            .client
            .post(CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if let Some(err) = Self::classify_status(status) {
            return Err(err);
        }
        if !status.is_success() {
            return Err(AiError::Transient(format!("openai returned {status}")));
        }

        let parsed: serde_json::Value = response.json().await?;
        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AiError::MalformedResponse("openai response missing choices[0].message.content".into()))
    }

    async fn embed(&self, text: &str, dim: usize) -> Result<Vec<f32>> {
        let body = json!({
            "model": self.embedding_model,
            "input": text,
            "dimensions": dim,
        });

        let response = self.client.post(EMBEDDINGS_URL).bearer_auth(&self.api_key).json(&body).send().await?;

        let status = response.status();
        if let Some(err) = Self::classify_status(status) {
            return Err(err);
        }
        if !status.is_success() {
            return Err(AiError::Transient(format!("openai returned {status}")));
        }

        let parsed: serde_json::Value = response.json().await?;
        let values = parsed["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| AiError::MalformedResponse("openai response missing data[0].embedding".into()))?;

        let vector: Vec<f32> = values.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect();
        if vector.len() != dim {
            return Err(AiError::MalformedResponse(format!(
                "openai returned embedding of length {}, expected {dim}",
                vector.len()
            )));
        }
        Ok(vector)
    }
}
