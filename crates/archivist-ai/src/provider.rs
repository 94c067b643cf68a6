//! The `AiProvider` port: a sum type over concrete
//! providers, each declaring the subset
//! of `{extract, analyze, embed}` it supports.

use crate::error::Result;
use archivist_core::model::AiAnalysis;
use async_trait::async_trait;

/// Extraction hint passed to `extract_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintType {
    Pdf,
    Image,
    Text,
    Office,
}

impl HintType {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => HintType::Pdf,
            "jpg" | "jpeg" | "png" => HintType::Image,
            "docx" => HintType::Office,
            _ => HintType::Text,
        }
    }
}

/// Per-page text, when the source format has pages.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub text: String,
    pub per_page: Option<Vec<String>>,
}

/// Declares which of the three capability families a provider supports
///.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub extract: bool,
    pub analyze: bool,
    pub embed: bool,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &str;
    fn capabilities(&self) -> Capabilities;

    /// For PDFs, callers fall back to OCR when native extraction yields
    /// fewer than N=50 characters/page on average; for
    /// images, OCR only. That decision lives in the gateway, not here —
    /// each provider simply does the best extraction it's capable of for
    /// the given hint.
    async fn extract_text(&self, bytes: &[u8], hint_type: HintType) -> Result<ExtractedText>;

    /// Structured output conforming to spec.md §3.2. Implementations
    /// return raw provider text; brace-balanced JSON parsing and the
    /// single re-ask on malformed output are the gateway's job
    /// (`crate::json_extract`), not the provider's.
    async fn analyze_raw(&self, text: &str, prompt: &str) -> Result<String>;

    /// `vector.len() == dim`.
    async fn embed(&self, text: &str, dim: usize) -> Result<Vec<f32>>;
}

/// Parsed, validated analysis result plus the raw text that produced it,
/// kept for logging on a retry.
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub analysis: AiAnalysis,
    pub raw: String,
}
