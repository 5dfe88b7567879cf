//! Caption transcript extraction.
//!
//! The pipeline depends only on [`TranscriptExtractor`]; the production
//! implementation shells out to `yt-dlp` and reads the English caption track.

mod models;
mod ytdlp;

pub use models::{format_timestamp, CaptionSegment, Transcript};
pub use ytdlp::YtDlpExtractor;

use crate::error::Result;
use crate::security::sanitize_for_log;
use crate::video::VideoId;
use async_trait::async_trait;
use std::fmt;

/// Trait for caption sources.
#[async_trait]
pub trait TranscriptExtractor: Send + Sync {
    /// Fetch the English caption transcript for a video.
    async fn fetch(&self, video: &VideoId) -> Result<Transcript>;
}

/// Why a transcript could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    NoCaptions,
    Restricted,
    Unavailable,
    Timeout,
    Network(String),
    Other(String),
}

impl ExtractionFailure {
    /// Map a raw extractor message onto a failure kind.
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["timed out", "timeout"]) {
            Self::Timeout
        } else if has(&[
            "private video",
            "video unavailable",
            "is not available",
            "has been removed",
            "does not exist",
        ]) {
            Self::Unavailable
        } else if has(&[
            "sign in to confirm",
            "age-restricted",
            "age restricted",
            "members-only",
            "inappropriate for some users",
        ]) {
            Self::Restricted
        } else if has(&[
            "no subtitles",
            "no captions",
            "no english",
            "subtitles are disabled",
            "captions are disabled",
            "transcripts disabled",
        ]) {
            Self::NoCaptions
        } else if has(&[
            "unable to download webpage",
            "connection",
            "network",
            "name resolution",
            "temporary failure",
            "http error 5",
        ]) {
            Self::Network(clean_reason(raw))
        } else {
            Self::Other(clean_reason(raw))
        }
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCaptions => f.write_str("No English captions available for this video"),
            Self::Restricted => f.write_str("Video is age restricted or requires sign-in"),
            Self::Unavailable => f.write_str("Video is unavailable or private"),
            Self::Timeout => f.write_str("Connection timeout while fetching transcript"),
            Self::Network(reason) => write!(f, "Network error while fetching transcript: {}", reason),
            Self::Other(reason) => f.write_str(reason),
        }
    }
}

/// First meaningful line of a tool's error output, without log prefixes.
fn clean_reason(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Unknown extraction error");

    let line = line.strip_prefix("ERROR:").map(str::trim).unwrap_or(line);
    // Drop "[youtube] <id>: " style prefixes.
    let line = match (line.starts_with('['), line.find(": ")) {
        (true, Some(idx)) => &line[idx + 2..],
        _ => line,
    };

    sanitize_for_log(line, 200)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_messages() {
        assert_eq!(
            ExtractionFailure::classify("ERROR: [youtube] abc: Private video. Sign in if you've been granted access"),
            ExtractionFailure::Unavailable
        );
        assert_eq!(
            ExtractionFailure::classify("ERROR: [youtube] abc: Sign in to confirm your age"),
            ExtractionFailure::Restricted
        );
        assert_eq!(
            ExtractionFailure::classify("WARNING: There are no subtitles for the requested languages"),
            ExtractionFailure::NoCaptions
        );
        assert_eq!(
            ExtractionFailure::classify("Read timed out"),
            ExtractionFailure::Timeout
        );
        assert!(matches!(
            ExtractionFailure::classify("ERROR: Unable to download webpage: <urlopen error>"),
            ExtractionFailure::Network(_)
        ));
    }

    #[test]
    fn test_other_reason_is_cleaned() {
        let failure = ExtractionFailure::classify(
            "\nERROR: [youtube] dQw4w9WgXcQ: Something odd happened\nTraceback...",
        );
        assert_eq!(
            failure,
            ExtractionFailure::Other("Something odd happened".to_string())
        );
        assert_eq!(failure.to_string(), "Something odd happened");
    }

    #[test]
    fn test_display_texts() {
        assert_eq!(
            ExtractionFailure::NoCaptions.to_string(),
            "No English captions available for this video"
        );
        assert_eq!(
            ExtractionFailure::Timeout.to_string(),
            "Connection timeout while fetching transcript"
        );
    }
}
