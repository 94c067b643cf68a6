//! `AiGateway`: holds an ordered list of providers, each
//! paired with its own `CircuitBreaker`, and routes each call to the first
//! provider whose circuit is closed and whose capability set matches,
//! advancing to the next provider on failure. Every call is wrapped in the
//! hard deadline D=120s and the retry/backoff policy from `crate::retry`.

use crate::circuit::CircuitBreaker;
use crate::error::{AiError, Result};
use crate::json_extract::parse_analysis;
use crate::provider::{AiProvider, AnalyzeOutcome, Capabilities, ExtractedText, HintType};
use crate::retry::{with_retry, RetryPolicy};
use archivist_core::model::AiAnalysis;
use archivist_taxonomy::TaxonomySnapshot;
use std::sync::Arc;
use std::time::Duration;

/// Native PDF extraction below this average characters-per-page falls back
/// to an OCR-capable provider.
pub const OCR_FALLBACK_THRESHOLD_CHARS_PER_PAGE: usize = 50;

/// Hard per-call deadline.
pub const CALL_DEADLINE: Duration = Duration::from_secs(120);

const STRICTER_FORMAT_SUFFIX: &str =
    "\n\nRespond with a single JSON object only. No markdown, no commentary, no code fences.";

struct Slot {
    provider: Arc<dyn AiProvider>,
    breaker: CircuitBreaker,
}

/// Provider-agnostic entry point used by the ingestion pipeline. Construct with [`AiGateway::new`] from an ordered
/// provider list; order determines selection priority for ties.
pub struct AiGateway {
    slots: Vec<Slot>,
    retry_policy: RetryPolicy,
}

impl AiGateway {
    pub fn new(providers: Vec<Arc<dyn AiProvider>>) -> Self {
        let slots = providers
            .into_iter()
            .map(|provider| Slot {
                provider,
                breaker: CircuitBreaker::new(),
            })
            .collect();
        Self {
            slots,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn candidates(&self, wants: impl Fn(Capabilities) -> bool) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| wants(slot.provider.capabilities()))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Runs `call` against each capable provider in order, skipping any
    /// whose circuit is open, retrying per `self.retry_policy` within a
    /// single provider before advancing to the next, and enforcing
    /// [`CALL_DEADLINE`] around the whole attempt per provider.
    async fn dispatch<T, F, Fut>(&self, candidate_idxs: &[usize], mut call: F) -> Result<T>
    where
        F: FnMut(Arc<dyn AiProvider>) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        if candidate_idxs.is_empty() {
            return Err(AiError::ProviderUnavailable("no configured provider supports this capability".into()));
        }

        let mut last_err = None;
        for &idx in candidate_idxs {
            let slot = &self.slots[idx];
            if !slot.breaker.try_acquire() {
                tracing::debug!(provider = slot.provider.name(), "skipping provider, circuit open");
                continue;
            }

            let provider = slot.provider.clone();
            let outcome = tokio::time::timeout(CALL_DEADLINE, with_retry(&self.retry_policy, || call(provider.clone()))).await;

            match outcome {
                Ok(Ok(value)) => {
                    slot.breaker.record_success();
                    return Ok(value);
                }
                Ok(Err(err)) => {
                    slot.breaker.record_failure(err.forces_open());
                    tracing::warn!(provider = slot.provider.name(), error = %err, "AI provider call failed");
                    last_err = Some(err);
                }
                Err(_) => {
                    slot.breaker.record_failure(false);
                    tracing::warn!(provider = slot.provider.name(), "AI provider call exceeded deadline");
                    last_err = Some(AiError::Transient(format!("{} exceeded {:?} deadline", slot.provider.name(), CALL_DEADLINE)));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| AiError::ProviderUnavailable("every capable provider's circuit is open".into())))
    }

    /// Extracts text, falling back to an OCR-capable provider when native
    /// extraction yields too little text per page. Images
    /// always route straight to an extract-capable provider since there is
    /// no "native" pass to attempt first.
    pub async fn extract_text(&self, bytes: &[u8], hint_type: HintType) -> Result<ExtractedText> {
        let idxs = self.candidates(|c| c.extract);
        let first = self.dispatch(&idxs, |provider| {
            let bytes = bytes.to_vec();
            async move { provider.extract_text(&bytes, hint_type).await }
        });

        let result = first.await?;
        if hint_type != HintType::Pdf {
            return Ok(result);
        }

        if !yields_enough_text(&result) {
            tracing::info!("native extraction below OCR threshold, retrying with OCR pass");
            return self
                .dispatch(&idxs, |provider| {
                    let bytes = bytes.to_vec();
                    async move { provider.extract_text(&bytes, hint_type).await }
                })
                .await;
        }
        Ok(result)
    }

    /// Structured analysis. On a malformed response,
    /// re-asks exactly once with a stricter format instruction before
    /// giving up on that provider attempt.
    pub async fn analyze(&self, text: &str, prompt_template: &str, taxonomy: &TaxonomySnapshot) -> Result<AnalyzeOutcome> {
        let idxs = self.candidates(|c| c.analyze);
        let prompt = render_prompt(prompt_template, taxonomy);

        self.dispatch(&idxs, |provider| {
            let text = text.to_string();
            let prompt = prompt.clone();
            async move {
                let raw = provider.analyze_raw(&text, &prompt).await?;
                match parse_analysis(&raw) {
                    Ok(analysis) => Ok(AnalyzeOutcome { analysis, raw }),
                    Err(_) => {
                        let stricter = format!("{prompt}{STRICTER_FORMAT_SUFFIX}");
                        let retried = provider.analyze_raw(&text, &stricter).await?;
                        let analysis = parse_analysis(&retried)?;
                        Ok(AnalyzeOutcome { analysis, raw: retried })
                    }
                }
            }
        })
        .await
    }

    pub async fn embed(&self, text: &str, dim: usize) -> Result<Vec<f32>> {
        let idxs = self.candidates(|c| c.embed);
        self.dispatch(&idxs, |provider| {
            let text = text.to_string();
            async move { provider.embed(&text, dim).await }
        })
        .await
    }
}

fn yields_enough_text(extracted: &ExtractedText) -> bool {
    match &extracted.per_page {
        Some(pages) if !pages.is_empty() => {
            let total: usize = pages.iter().map(|p| p.len()).sum();
            total / pages.len() >= OCR_FALLBACK_THRESHOLD_CHARS_PER_PAGE
        }
        _ => extracted.text.len() >= OCR_FALLBACK_THRESHOLD_CHARS_PER_PAGE,
    }
}

fn render_prompt(template: &str, taxonomy: &TaxonomySnapshot) -> String {
    let mut terms: Vec<String> = taxonomy.canonical_terms().into_iter().collect();
    terms.sort();
    template.replace("{{taxonomy}}", &terms.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Capabilities;
    use crate::providers::{MockBehavior, MockProvider};
    use archivist_taxonomy::TaxonomySnapshot;

    fn full_capabilities() -> Capabilities {
        Capabilities { extract: true, analyze: true, embed: true }
    }

    #[tokio::test]
    async fn analyze_uses_first_capable_provider() {
        let provider: Arc<dyn AiProvider> = Arc::new(MockProvider::new("mock", full_capabilities()));
        let gateway = AiGateway::new(vec![provider]);
        let outcome = gateway.analyze("doc text", "Summarize: {{taxonomy}}", &TaxonomySnapshot::default()).await.unwrap();
        assert_eq!(outcome.analysis.summary.as_deref(), Some("mock summary"));
    }

    #[tokio::test]
    async fn advances_to_next_provider_on_failure() {
        let bad: Arc<dyn AiProvider> = Arc::new(
            MockProvider::new("bad", full_capabilities()).with_behavior(MockBehavior::Fail(AiError::QuotaExhausted("out".into()))),
        );
        let good: Arc<dyn AiProvider> = Arc::new(MockProvider::new("good", full_capabilities()));
        let gateway = AiGateway::new(vec![bad, good]).with_retry_policy(RetryPolicy {
            max_attempts: 1,
            base: Duration::from_millis(1),
            cap: Duration::from_millis(1),
        });
        let outcome = gateway.embed("text", 8).await.unwrap();
        assert_eq!(outcome.len(), 8);
    }

    #[tokio::test]
    async fn no_capable_provider_returns_provider_unavailable() {
        let extract_only: Arc<dyn AiProvider> =
            Arc::new(MockProvider::new("extract-only", Capabilities { extract: true, analyze: false, embed: false }));
        let gateway = AiGateway::new(vec![extract_only]);
        let err = gateway.embed("text", 8).await.unwrap_err();
        assert!(matches!(err, AiError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn open_circuit_skips_provider_without_retrying() {
        let bad: Arc<dyn AiProvider> = Arc::new(
            MockProvider::new("bad", full_capabilities()).with_behavior(MockBehavior::Fail(AiError::QuotaExhausted("out".into()))),
        );
        let good: Arc<dyn AiProvider> = Arc::new(MockProvider::new("good", full_capabilities()));
        let gateway = AiGateway::new(vec![bad.clone(), good]);

        // First call fails over from bad (QuotaExhausted forces its circuit open) to good.
        let _ = gateway.embed("text", 8).await;
        // Second call should skip bad's now-open circuit entirely and go straight to good.
        let outcome = gateway.embed("text", 8).await.unwrap();
        assert_eq!(outcome.len(), 8);
    }
}
