//! Transcript summarization.

mod chat;

pub use chat::OpenAiSummarizer;

use crate::error::Result;
use crate::transcript::Transcript;
use async_trait::async_trait;

/// Trait for summary generators.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produce a Markdown summary of the transcript.
    async fn summarize(&self, transcript: &Transcript) -> Result<String>;
}
