//! Thin typed client for Google's Gemini API. The only provider in this set that supports
//! `extract_text`, including the OCR pass for image and low-text-yield
//! PDF pages.

use crate::error::{AiError, Result};
use crate::provider::{AiProvider, Capabilities, ExtractedText, HintType};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::json;
use std::time::Duration;

const DEFAULT_MODEL: &str = "gemini-1.5-flash";

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client builds");
        Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    fn generate_url(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }

    fn mime_for(hint_type: HintType) -> &'static str {
        match hint_type {
            HintType::Pdf => "application/pdf",
            HintType::Image => "image/png",
            HintType::Office => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            HintType::Text => "text/plain",
        }
    }

    async fn generate_content(&self, parts: serde_json::Value) -> Result<String> {
        let body = json!({ "contents": [{ "parts": parts }] });
        let response = self.client.post(self.generate_url()).json(&body).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AiError::RateLimited { retry_after_s: 5 });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AiError::Unauthorized("gemini rejected the API key".into()));
        }
        if status == reqwest::StatusCode::FORBIDDEN || status.as_u16() == 402 {
            return Err(AiError::QuotaExhausted("gemini account quota exhausted".into()));
        }
        if !status.is_success() {
            return Err(AiError::Transient(format!("gemini returned {status}")));
        }

        let parsed: serde_json::Value = response.json().await?;
        parsed["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AiError::MalformedResponse("gemini response missing candidates[0].content.parts[0].text".into()))
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            extract: true,
            analyze: true,
            embed: false,
        }
    }

    /// For PDFs and images, asks Gemini to transcribe the document
    /// verbatim — the same call doubles as the OCR pass spec.md §4.5
    /// requires for images and low-yield PDF pages, since the gateway
    /// always routes those hints here.
    async fn extract_text(&self, bytes: &[u8], hint_type: HintType) -> Result<ExtractedText> {
        let encoded = STANDARD.encode(bytes);
        let parts = json!([
            {"text": "Transcribe all text from this document verbatim, preserving reading order. Return only the transcribed text."},
            {"inline_data": {"mime_type": Self::mime_for(hint_type), "data": encoded}},
        ]);
        let text = self.generate_content(parts).await?;
        Ok(ExtractedText { text, per_page: None })
    }

    async fn analyze_raw(&self, text: &str, prompt: &str) -> Result<String> {
        let parts = json!([{"text": format!("{prompt}\n\nDocument text:\n{text}")}]);
        self.generate_content(parts).await
    }

    async fn embed(&self, _text: &str, _dim: usize) -> Result<Vec<f32>> {
        Err(AiError::ProviderUnavailable("gemini provider is not configured for embed".into()))
    }
}
