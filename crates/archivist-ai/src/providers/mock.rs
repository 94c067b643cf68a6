//! Deterministic test double used by fixtures: returns canned results for each capability, or simulates a
//! configurable failure, without making network calls.

use crate::error::{AiError, Result};
use crate::provider::{AiProvider, Capabilities, ExtractedText, HintType};
use archivist_core::model::AiAnalysis;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// What a `MockProvider` call should do, in order of precedence.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Succeed,
    Fail(AiError),
    /// Fails the first `n` calls, then succeeds.
    FailThen { remaining: u32, err: AiError },
}

pub struct MockProvider {
    name: String,
    capabilities: Capabilities,
    behavior: Mutex<MockBehavior>,
    extracted_text: String,
    analysis: AiAnalysis,
    embedding: Vec<f32>,
    calls: AtomicU32,
}

impl MockProvider {
    pub fn new(name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            name: name.into(),
            capabilities,
            behavior: Mutex::new(MockBehavior::Succeed),
            extracted_text: "mock extracted text".to_string(),
            analysis: AiAnalysis {
                summary: Some("mock summary".to_string()),
                document_type: None,
                campaign_type: None,
                document_tone: None,
                categories: vec!["General".to_string()],
                keyword_mappings: Vec::new(),
                extra: serde_json::Map::new(),
            },
            embedding: vec![0.1; 8],
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = Mutex::new(behavior);
        self
    }

    pub fn with_extracted_text(mut self, text: impl Into<String>) -> Self {
        self.extracted_text = text.into();
        self
    }

    pub fn with_analysis(mut self, analysis: AiAnalysis) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn resolve(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.behavior.lock();
        match &mut *guard {
            MockBehavior::Succeed => Ok(()),
            MockBehavior::Fail(err) => Err(err.clone()),
            MockBehavior::FailThen { remaining, err } => {
                if *remaining > 0 {
                    *remaining -= 1;
                    Err(err.clone())
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[async_trait]
impl AiProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn extract_text(&self, _bytes: &[u8], _hint_type: HintType) -> Result<ExtractedText> {
        self.resolve()?;
        Ok(ExtractedText {
            text: self.extracted_text.clone(),
            per_page: None,
        })
    }

    async fn analyze_raw(&self, _text: &str, _prompt: &str) -> Result<String> {
        self.resolve()?;
        serde_json::to_string(&self.analysis).map_err(|e| AiError::MalformedResponse(e.to_string()))
    }

    async fn embed(&self, _text: &str, dim: usize) -> Result<Vec<f32>> {
        self.resolve()?;
        if self.embedding.len() != dim {
            return Err(AiError::MalformedResponse(format!(
                "mock embedding has length {}, caller requested {dim}",
                self.embedding.len()
            )));
        }
        Ok(self.embedding.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn succeeds_by_default() {
        let provider = MockProvider::new("mock", Capabilities { extract: true, analyze: true, embed: true });
        assert!(provider.extract_text(b"x", HintType::Text).await.is_ok());
        assert!(provider.analyze_raw("x", "p").await.is_ok());
        assert!(provider.embed("x", 8).await.is_ok());
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn fail_then_succeeds_after_configured_attempts() {
        let provider = MockProvider::new("mock", Capabilities { extract: false, analyze: true, embed: false })
            .with_behavior(MockBehavior::FailThen { remaining: 2, err: AiError::Transient("boom".into()) });
        assert!(provider.analyze_raw("x", "p").await.is_err());
        assert!(provider.analyze_raw("x", "p").await.is_err());
        assert!(provider.analyze_raw("x", "p").await.is_ok());
    }
}
