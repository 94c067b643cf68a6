//! Concrete `AiProvider` implementations.

pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use mock::{MockBehavior, MockProvider};
pub use openai::OpenAiProvider;
