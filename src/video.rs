//! YouTube URL discovery and canonical video ids.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn url_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            https?://
            (?:www\.|m\.)?
            (?:youtube\.com/(?:watch\?|embed/|shorts/|v/)|youtu\.be/)
            \S+
        ",
        )
        .ok()
    })
    .as_ref()
}

/// A validated 11-character YouTube video id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    /// Accept a bare id if it has the YouTube shape.
    pub fn parse(id: &str) -> Option<Self> {
        let valid = id.len() == 11
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| Self(id.to_string()))
    }

    /// Extract the id from any supported YouTube URL form.
    pub fn from_url(input: &str) -> Option<Self> {
        let url = Url::parse(input.trim()).ok()?;
        let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

        match host {
            "youtu.be" => url.path_segments()?.next().and_then(Self::parse),
            "youtube.com" => {
                let mut segments = url.path_segments()?;
                match segments.next()? {
                    "watch" => url
                        .query_pairs()
                        .find(|(k, _)| k == "v")
                        .and_then(|(_, v)| Self::parse(&v)),
                    "embed" | "shorts" | "v" => segments.next().and_then(Self::parse),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL, independent of how the video was referenced.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// First YouTube URL found in free text.
pub fn find_youtube_url(text: &str) -> Option<&str> {
    url_regex()?.find(text).map(|m| {
        m.as_str()
            .trim_end_matches(|c: char| matches!(c, '.' | ',' | ')' | '!' | '?' | '"' | '\''))
    })
}
