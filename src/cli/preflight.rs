//! Pre-flight checks before starting long-running work.
//!
//! Validates that required tools and configuration are available
//! before the server starts or a summary is requested.

use crate::config::Settings;
use crate::error::{RecapError, Result};
use crate::openai::is_api_key_configured;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Serving needs the API key and yt-dlp.
    Serve,
    /// A one-shot summary needs the same as serving.
    Summarize,
    /// Cache maintenance only touches the database.
    Cache,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Serve | Operation::Summarize => {
            check_api_key(settings)?;
            check_tool(&settings.transcript.ytdlp_binary)?;
        }
        Operation::Cache => {}
    }
    Ok(())
}

fn check_api_key(settings: &Settings) -> Result<()> {
    if is_api_key_configured(&settings.summarizer) {
        Ok(())
    } else {
        Err(RecapError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            settings.summarizer.api_key_env, settings.summarizer.api_key_env
        )))
    }
}

/// Check that an external tool runs.
pub fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(RecapError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RecapError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(RecapError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
