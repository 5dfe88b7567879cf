//! Prompt classification.

use crate::video::{find_youtube_url, VideoId};

const IDENTITY_PHRASES: &[&str] = &[
    "who are you",
    "who are you?",
    "what do you do",
    "what do you do?",
    "what are you",
    "what are you?",
];

const GREETING_PHRASES: &[&str] = &["hi", "hi!", "hello", "hello!", "hey", "hey!"];

/// What the caller is asking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    VideoSummary { url: String, video: VideoId },
    Greeting,
    Identity,
    OutOfScope,
    /// A YouTube link whose video id could not be extracted.
    MalformedVideoUrl { url: String },
}

impl Intent {
    pub fn classify(prompt: &str) -> Self {
        let normalized = prompt.trim().to_lowercase();

        if IDENTITY_PHRASES.contains(&normalized.as_str()) {
            return Intent::Identity;
        }
        if GREETING_PHRASES.contains(&normalized.as_str()) {
            return Intent::Greeting;
        }

        match find_youtube_url(prompt) {
            None => Intent::OutOfScope,
            Some(url) => match VideoId::from_url(url) {
                Some(video) => Intent::VideoSummary {
                    url: url.to_string(),
                    video,
                },
                None => Intent::MalformedVideoUrl {
                    url: url.to_string(),
                },
            },
        }
    }
}
