//! Concrete [`crate::pipeline::StageHandler`] implementations for the
//! five document pipeline steps A-E.

pub mod analyze;
pub mod embed;
pub mod extract_text;
pub mod fetch_blob;
pub mod preview_stage;

pub use analyze::AnalyzeStage;
pub use embed::EmbedStage;
pub use extract_text::ExtractTextStage;
pub use fetch_blob::FetchBlobStage;
pub use preview_stage::PreviewStage;
