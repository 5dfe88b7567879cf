//! Prompt templates and canned replies for Recap.
//!
//! Both can be customized by placing TOML files in the custom prompts directory.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub summary: SummaryPrompts,
    /// Static replies for greetings, identity questions and out-of-scope prompts.
    pub replies: ReplyPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}


/// Prompts for transcript summarization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryPrompts {
    pub system: String,
    pub user: String,
}

impl Default for SummaryPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a video content analyst. You turn YouTube transcripts into clear, well-structured summaries.

Guidelines:
- Only use information present in the transcript
- Reference moments with the [MM:SS] timestamps given in the transcript
- Skip filler such as subscription requests, sponsor reads and sign-offs
- Write in Markdown"#.to_string(),

            user: r#"Please analyze this YouTube video transcript and provide a comprehensive summary with the following structure:

## General Summary
Provide a 2-3 paragraph overview of the video's main content and key points.

## Section Breakdown
Create subheadings for major topics/sections and include relevant timestamps from the transcript. Use the timestamp format [MM:SS] when referencing specific parts.

Here is the transcript with timestamps:

{{transcript}}

Please ensure your response includes:
1. A clear general summary
2. Organized subheadings for different topics
3. Specific timestamps for key sections
4. Important quotes or key points with their timestamps"#.to_string(),
        }
    }
}

/// Canned replies for prompts that never reach the summarizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyPrompts {
    pub identity: Vec<String>,
    pub greeting: Vec<String>,
    pub out_of_scope: Vec<String>,
}

impl Default for ReplyPrompts {
    fn default() -> Self {
        Self {
            identity: vec![
                "Hello! I'm a YouTube summarizer specialized in analyzing YouTube videos and creating detailed summaries with timestamps. Share a YouTube URL and I'll break it down for you!".to_string(),
                "Hi there! I'm designed to summarize YouTube videos with comprehensive breakdowns and timestamps. Got a video you'd like me to analyze?".to_string(),
                "I'm a YouTube video analysis assistant! I create detailed summaries of YouTube content with section breakdowns and timestamps. Drop a YouTube link and let's get started!".to_string(),
            ],
            greeting: vec![
                "Hello! I specialize in summarizing YouTube videos. If you have a YouTube video link you'd like me to analyze, I'd be happy to create a detailed summary for you!".to_string(),
                "Hi there! I'm here to help you understand YouTube videos better through detailed summaries. Share a YouTube URL and I'll get to work!".to_string(),
                "Hey! I turn YouTube videos into comprehensive summaries with timestamps. Got a video you need broken down?".to_string(),
            ],
            out_of_scope: vec![
                "I specialize in YouTube video analysis and summarization. While I can't help with general questions, I'd love to summarize any YouTube video you share!".to_string(),
                "I'm focused on creating detailed YouTube video summaries. For other topics, you might want to try a different assistant, but I'm great with YouTube content!".to_string(),
                "My expertise is in analyzing and summarizing YouTube videos with timestamps and breakdowns. Got a video link you'd like me to work on?".to_string(),
            ],
        }
    }
}

impl ReplyPrompts {
    /// Pick one reply at random from a list, falling back to a fixed line.
    pub fn pick(options: &[String]) -> String {
        options
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| "Share a YouTube URL and I'll summarize it for you.".to_string())
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let summary_path = custom_path.join("summary.toml");
            if summary_path.exists() {
                let content = std::fs::read_to_string(&summary_path)?;
                prompts.summary = toml::from_str(&content)?;
            }

            let replies_path = custom_path.join("replies.toml");
            if replies_path.exists() {
                let content = std::fs::read_to_string(&replies_path)?;
                prompts.replies = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
