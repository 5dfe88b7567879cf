//! Configuration module for Recap.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, ReplyPrompts, SummaryPrompts};
pub use settings::{
    CacheSettings, GeneralSettings, PromptSettings, RateLimitSettings, SecuritySettings,
    ServerSettings, Settings, StreamingSettings, SummarizerSettings, TranscriptSettings,
};
