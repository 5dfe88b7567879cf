//! OpenAI-compatible client construction.

use crate::config::SummarizerSettings;
use crate::error::{RecapError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Whether the API key variable named in the settings is set and non-empty.
pub fn is_api_key_configured(settings: &SummarizerSettings) -> bool {
    std::env::var(&settings.api_key_env)
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false)
}

/// Create a chat client with the configured endpoint, key and timeout.
pub fn create_client(settings: &SummarizerSettings) -> Result<Client<OpenAIConfig>> {
    let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
        RecapError::Config(format!(
            "{} is not set. Export an API key for the summarization endpoint.",
            settings.api_key_env
        ))
    })?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_seconds))
        .build()?;

    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = &settings.api_base {
        config = config.with_api_base(base.trim_end_matches('/'));
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_config_error() {
        let settings = SummarizerSettings {
            api_key_env: "RECAP_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert!(!is_api_key_configured(&settings));
        assert!(matches!(create_client(&settings), Err(RecapError::Config(_))));
    }
}
