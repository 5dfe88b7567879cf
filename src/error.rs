//! Error types for Recap.

use crate::security::SecurityFinding;
use crate::transcript::ExtractionFailure;
use std::time::Duration;
use thiserror::Error;

/// Library-level error type for Recap operations.
#[derive(Error, Debug)]
pub enum RecapError {
    #[error("Security violation: {0}")]
    SecurityViolation(SecurityFinding),

    #[error("Rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Platform is at capacity ({max_concurrent} concurrent requests)")]
    CapacityExceeded { max_concurrent: usize },

    #[error("Transcript extraction failed: {0}")]
    ExtractionFailed(ExtractionFailure),

    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("Cache I/O failure: {0}")]
    CacheIo(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid YouTube URL: {0}")]
    InvalidVideoUrl(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),
}

impl RecapError {
    /// Short machine-readable code for the error category.
    pub fn code(&self) -> &'static str {
        match self {
            RecapError::SecurityViolation(_) => "SECURITY_ERROR",
            RecapError::RateLimited { .. } => "RATE_LIMIT_ERROR",
            RecapError::CapacityExceeded { .. } => "CAPACITY_ERROR",
            RecapError::ExtractionFailed(_) => "TRANSCRIPT_ERROR",
            RecapError::SummarizationFailed(_) | RecapError::OpenAI(_) => "SUMMARY_ERROR",
            RecapError::InvalidRequest(_) => "INPUT_ERROR",
            RecapError::InvalidVideoUrl(_) => "URL_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Title and explanation shown to the caller when this error ends a request.
    pub fn user_message(&self) -> (String, String) {
        match self {
            RecapError::SecurityViolation(finding) => (
                format!("Security Alert: {}", finding.category.describe()),
                "**For your security:**\n\
                 - Malicious patterns were detected in your input\n\
                 - Please revise your request and try again\n\
                 - If you believe this is an error, please contact support"
                    .to_string(),
            ),
            RecapError::RateLimited { retry_after } => (
                "Rate Limit Exceeded".to_string(),
                format!(
                    "You are temporarily blocked. Try again in {} seconds.\n\n\
                     Please wait before making another request.",
                    retry_after.as_secs().max(1)
                ),
            ),
            RecapError::CapacityExceeded { max_concurrent } => (
                "Platform At Capacity".to_string(),
                format!(
                    "The platform is handling its maximum of {} concurrent summaries. \
                     Please try again in a moment.",
                    max_concurrent
                ),
            ),
            RecapError::ExtractionFailed(failure) => (
                "Failed to extract transcript from video".to_string(),
                format!(
                    "{}\n\n\
                     **This could be due to:**\n\
                     - Video doesn't have English captions/subtitles\n\
                     - Video is private or age restricted\n\
                     - Captions are disabled\n\n\
                     **Please try:**\n\
                     - A different video with English captions\n\
                     - Ensuring the video is publicly accessible\n\
                     - Waiting a moment and trying again",
                    failure
                ),
            ),
            RecapError::SummarizationFailed(reason) | RecapError::OpenAI(reason) => (
                "Failed to generate summary".to_string(),
                format!("{}\n\nPlease try again later.", reason),
            ),
            RecapError::InvalidVideoUrl(_) => (
                "Invalid YouTube URL".to_string(),
                "**This could be due to:**\n\
                 - Malformed or incomplete YouTube URL\n\
                 - Missing characters in the video ID\n\
                 - URL format not recognized\n\n\
                 **Valid YouTube URL formats:**\n\
                 - https://youtube.com/watch?v=VIDEO_ID\n\
                 - https://youtu.be/VIDEO_ID\n\
                 - https://youtube.com/embed/VIDEO_ID"
                    .to_string(),
            ),
            RecapError::InvalidRequest(reason) => {
                ("Invalid Request".to_string(), reason.clone())
            }
            other => (
                "Unexpected Error".to_string(),
                format!(
                    "An unexpected error occurred: {}\n\nPlease try again later.",
                    other
                ),
            ),
        }
    }
}

/// Result type alias for Recap operations.
pub type Result<T> = std::result::Result<T, RecapError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::ThreatCategory;

    #[test]
    fn test_rate_limit_message_includes_wait() {
        let err = RecapError::RateLimited {
            retry_after: Duration::from_secs(287),
        };
        let (title, details) = err.user_message();
        assert_eq!(title, "Rate Limit Exceeded");
        assert!(details.contains("287 seconds"));
        assert_eq!(err.code(), "RATE_LIMIT_ERROR");
    }

    #[test]
    fn test_security_message_names_category() {
        let err = RecapError::SecurityViolation(SecurityFinding {
            category: ThreatCategory::PathTraversal,
            pattern: "../".to_string(),
        });
        let (title, _) = err.user_message();
        assert!(title.contains("path traversal"));
    }

    #[test]
    fn test_extraction_message_includes_reason() {
        let err = RecapError::ExtractionFailed(ExtractionFailure::NoCaptions);
        let (_, details) = err.user_message();
        assert!(details.starts_with("No English captions"));
    }
}
