//! Caption extraction via yt-dlp.
//!
//! Only the subtitle track is fetched (`--skip-download`), in yt-dlp's `json3`
//! format, into a scratch directory that is removed when the fetch ends.

use super::{format_timestamp, CaptionSegment, ExtractionFailure, Transcript, TranscriptExtractor};
use crate::config::TranscriptSettings;
use crate::error::{RecapError, Result};
use crate::video::VideoId;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Transcript extractor backed by the `yt-dlp` binary.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: String,
    timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new(settings: &TranscriptSettings) -> Self {
        Self {
            binary: settings.ytdlp_binary.clone(),
            timeout: Duration::from_secs(settings.timeout_seconds),
        }
    }

    async fn download_captions(&self, video: &VideoId, dir: &Path) -> Result<()> {
        let template = dir.join(format!("{}.%(ext)s", video));

        let result = Command::new(&self.binary)
            .arg("--skip-download")
            .arg("--write-subs")
            .arg("--write-auto-subs")
            .arg("--sub-langs").arg("en.*,en")
            .arg("--sub-format").arg("json3")
            .arg("--output").arg(&template)
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg(video.watch_url())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RecapError::ToolNotFound(self.binary.clone()));
            }
            Err(e) => {
                return Err(RecapError::ExtractionFailed(ExtractionFailure::Other(format!(
                    "yt-dlp execution failed: {e}"
                ))));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp exited with {}", output.status);
            return Err(RecapError::ExtractionFailed(ExtractionFailure::classify(
                &stderr,
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl TranscriptExtractor for YtDlpExtractor {
    #[instrument(skip(self), fields(video_id = %video))]
    async fn fetch(&self, video: &VideoId) -> Result<Transcript> {
        let scratch = tempfile::tempdir()?;

        info!("Fetching captions");
        match tokio::time::timeout(self.timeout, self.download_captions(video, scratch.path()))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!("Caption download exceeded {}s", self.timeout.as_secs());
                return Err(RecapError::ExtractionFailed(ExtractionFailure::Timeout));
            }
        }

        let Some(path) = find_caption_file(scratch.path(), video.as_str())? else {
            return Err(RecapError::ExtractionFailed(ExtractionFailure::NoCaptions));
        };

        debug!("Parsing caption file {:?}", path);
        let raw = tokio::fs::read_to_string(&path).await?;
        let transcript = parse_json3(video.as_str(), &raw)?;

        if transcript.is_empty() {
            return Err(RecapError::ExtractionFailed(ExtractionFailure::NoCaptions));
        }

        info!(
            "Extracted {} caption segments covering {}",
            transcript.segments.len(),
            format_timestamp(transcript.duration_seconds)
        );
        Ok(transcript)
    }
}

/// Locate the caption file, preferring the plain `en` track.
fn find_caption_file(dir: &Path, video_id: &str) -> Result<Option<PathBuf>> {
    let preferred = dir.join(format!("{}.en.json3", video_id));
    if preferred.exists() {
        return Ok(Some(preferred));
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json3"))
        .collect();
    candidates.sort();

    Ok(candidates.into_iter().next())
}

#[derive(Debug, Deserialize)]
struct Json3Captions {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Parse yt-dlp `json3` captions into ordered segments.
fn parse_json3(video_id: &str, raw: &str) -> Result<Transcript> {
    let captions: Json3Captions = serde_json::from_str(raw)?;

    let segments = captions
        .events
        .into_iter()
        .filter_map(|event| {
            let text = event
                .segs
                .iter()
                .map(|s| s.utf8.as_str())
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");

            if text.is_empty() {
                return None;
            }

            let start = event.t_start_ms as f64 / 1000.0;
            let end = (event.t_start_ms + event.d_duration_ms) as f64 / 1000.0;
            Some(CaptionSegment::new(start, end, text))
        })
        .collect();

    Ok(Transcript::new(video_id.to_string(), segments))
}
