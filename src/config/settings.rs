//! Configuration settings for Recap.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub security: SecuritySettings,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
    pub transcript: TranscriptSettings,
    pub summarizer: SummarizerSettings,
    pub streaming: StreamingSettings,
    pub prompts: PromptSettings,
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.recap".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Processor ID every incoming session must carry.
    pub processor_id: String,
    /// How often idle rate-limit sessions are pruned (seconds).
    pub prune_interval_seconds: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            processor_id: "recap".to_string(),
            prune_interval_seconds: 300,
        }
    }
}

/// Input screening limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Maximum prompt length in characters.
    pub max_prompt_length: usize,
    /// Maximum length of any single URL in the prompt.
    pub max_url_length: usize,
    /// Maximum consecutive repeats of one character.
    pub max_repeated_chars: usize,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            max_prompt_length: 5000,
            max_url_length: 2048,
            max_repeated_chars: 50,
        }
    }
}

/// Per-session and platform-wide admission limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Summaries allowed per session in any trailing minute.
    pub requests_per_minute: usize,
    /// Summaries allowed per session in any trailing hour.
    pub requests_per_hour: usize,
    /// Summaries allowed in flight across the whole platform.
    pub max_concurrent: usize,
    /// How long a session stays blocked after a violation (seconds).
    pub block_duration_seconds: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: 10,
            requests_per_hour: 50,
            max_concurrent: 200,
            block_duration_seconds: 300,
        }
    }
}

impl RateLimitSettings {
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_duration_seconds)
    }
}

/// Summary cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Path to the SQLite cache database.
    pub sqlite_path: String,
    /// Time-to-live for cached summaries, in hours.
    pub ttl_hours: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.recap/cache.db".to_string(),
            ttl_hours: 168, // 7 days
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(3600))
    }
}

/// Transcript extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptSettings {
    /// yt-dlp executable name or path.
    pub ytdlp_binary: String,
    /// Timeout for a single extraction, in seconds.
    pub timeout_seconds: u64,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            ytdlp_binary: "yt-dlp".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// LLM summarization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    /// Chat model identifier.
    pub model: String,
    /// OpenAI-compatible API base URL. None uses the OpenAI default.
    pub api_base: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Maximum tokens in the generated summary.
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Request timeout, in seconds.
    pub timeout_seconds: u64,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 2048,
            temperature: 0.3,
            top_p: 0.9,
            timeout_seconds: 60,
        }
    }
}

/// Response streaming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Characters per emitted content chunk.
    pub chunk_chars: usize,
    /// Pause between chunks, in milliseconds.
    pub chunk_delay_ms: u64,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            chunk_chars: 24,
            chunk_delay_ms: 15,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}


impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Reject settings the services cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::RecapError;

        if self.rate_limit.max_concurrent == 0 {
            return Err(RecapError::Config(
                "rate_limit.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.requests_per_minute == 0 || self.rate_limit.requests_per_hour == 0 {
            return Err(RecapError::Config(
                "rate_limit request thresholds must be at least 1".to_string(),
            ));
        }
        if self.streaming.chunk_chars == 0 {
            return Err(RecapError::Config(
                "streaming.chunk_chars must be at least 1".to_string(),
            ));
        }
        if self.server.processor_id.trim().is_empty() {
            return Err(RecapError::Config(
                "server.processor_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::RecapError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recap")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded cache database path.
    pub fn cache_path(&self) -> PathBuf {
        Self::expand_path(&self.cache.sqlite_path)
    }
}
