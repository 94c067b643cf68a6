//! Provider-agnostic AI Gateway: text extraction, structured
//! analysis, and embedding generation behind a common trait, with
//! per-provider circuit breaking and jittered-backoff retry.

pub mod circuit;
pub mod error;
pub mod gateway;
pub mod json_extract;
pub mod provider;
pub mod providers;
pub mod retry;

pub use circuit::{CircuitBreaker, CircuitState};
pub use error::{AiError, Result};
pub use gateway::AiGateway;
pub use provider::{AiProvider, AnalyzeOutcome, Capabilities, ExtractedText, HintType};
pub use retry::RetryPolicy;
