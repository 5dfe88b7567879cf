//! Chat-completion summarizer.

use super::Summarizer;
use crate::config::{Prompts, SummarizerSettings};
use crate::error::{RecapError, Result};
use crate::openai::create_client;
use crate::transcript::Transcript;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Summarizer that calls an OpenAI-compatible chat completion endpoint.
pub struct OpenAiSummarizer {
    client: Client<OpenAIConfig>,
    settings: SummarizerSettings,
    prompts: Prompts,
}

impl OpenAiSummarizer {
    pub fn new(settings: SummarizerSettings, prompts: Prompts) -> Result<Self> {
        let client = create_client(&settings)?;
        Ok(Self::with_client(client, settings, prompts))
    }

    pub fn with_client(
        client: Client<OpenAIConfig>,
        settings: SummarizerSettings,
        prompts: Prompts,
    ) -> Self {
        Self {
            client,
            settings,
            prompts,
        }
    }

    #[allow(deprecated)]
    fn build_request(&self, transcript: &Transcript) -> Result<CreateChatCompletionRequest> {
        let mut vars = HashMap::new();
        vars.insert(
            "transcript".to_string(),
            transcript.format_with_timestamps(),
        );
        vars.insert("video_id".to_string(), transcript.video_id.clone());

        let user_prompt = self
            .prompts
            .render_with_custom(&self.prompts.summary.user, &vars);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.summary.system.clone())
                .build()
                .map_err(|e| RecapError::SummarizationFailed(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| RecapError::SummarizationFailed(e.to_string()))?
                .into(),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .messages(messages)
            .max_tokens(self.settings.max_tokens)
            .temperature(self.settings.temperature)
            .top_p(self.settings.top_p)
            .build()
            .map_err(|e| RecapError::SummarizationFailed(e.to_string()))
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    #[instrument(skip_all, fields(video_id = %transcript.video_id, segments = transcript.segments.len()))]
    async fn summarize(&self, transcript: &Transcript) -> Result<String> {
        let request = self.build_request(transcript)?;

        info!("Requesting summary from {}", self.settings.model);
        let response = self.client.chat().create(request).await.map_err(|e| {
            RecapError::OpenAI(format!("Failed to generate summary: {}", e))
        })?;

        let summary = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                RecapError::SummarizationFailed("Empty response from the model".to_string())
            })?
            .to_string();

        debug!("Received summary of {} characters", summary.len());
        Ok(summary)
    }
}
