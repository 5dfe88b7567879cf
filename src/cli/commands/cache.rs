//! Cache command - inspect and maintain the summary cache.

use crate::cache::SummaryCache;
use crate::cli::preflight::{self, Operation};
use crate::cli::{format_size, CacheAction, Output};
use crate::config::Settings;
use crate::video::VideoId;
use anyhow::Result;

/// Run the cache command.
pub fn run_cache(action: &CacheAction, settings: &Settings) -> Result<()> {
    preflight::check(Operation::Cache, settings)?;
    let cache = SummaryCache::new(&settings.cache_path(), settings.cache.ttl())?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            Output::header("Summary Cache");
            Output::kv("Path", &settings.cache_path().display().to_string());
            Output::kv("TTL", &format!("{} hours", settings.cache.ttl_hours));
            Output::kv("Entries", &stats.total_entries.to_string());
            Output::kv("Valid", &stats.valid_entries.to_string());
            Output::kv("Expired", &stats.expired_entries.to_string());
            Output::kv("Payload size", &format_size(stats.payload_bytes));
        }

        CacheAction::Clear { video: Some(input) } => {
            let video = VideoId::from_url(input)
                .or_else(|| VideoId::parse(input))
                .ok_or_else(|| anyhow::anyhow!("Not a YouTube URL or video id: {}", input))?;

            match cache.clear(Some(video.as_str()))? {
                0 => Output::info(&format!("No cached summary for {}", video)),
                _ => Output::success(&format!("Removed cached summary for {}", video)),
            }
        }

        CacheAction::Clear { video: None } => {
            let removed = cache.clear(None)?;
            Output::success(&format!("Removed {} cached summaries", removed));
        }

        CacheAction::Prune => {
            let removed = cache.cleanup_expired()?;
            Output::success(&format!("Removed {} expired summaries", removed));
        }
    }

    Ok(())
}
