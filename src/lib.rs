//! Recap - streaming YouTube video summaries
//!
//! A service that turns a prompt containing a YouTube link into a Markdown
//! summary with timestamps, streamed back as Server-Sent Events.
//!
//! # Overview
//!
//! Every request passes through:
//! - a security validator that rejects injection-style input
//! - an intent classifier (video, greeting, identity, out of scope)
//! - per-session sliding-window rate limits and a platform concurrency cap
//! - a persistent summary cache keyed by video id
//! - caption extraction (`yt-dlp`) and summarization (OpenAI-compatible chat)
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `security` - Prompt validation and log sanitization
//! - `rate_limit` - Session windows and concurrency slots
//! - `cache` - SQLite-backed summary cache
//! - `video` - YouTube URL parsing
//! - `transcript` - Caption extraction
//! - `summarizer` - Summary generation
//! - `pipeline` - Request orchestration and response streaming
//! - `server` - HTTP/SSE ingress
//!
//! # Example
//!
//! ```rust,no_run
//! use recap::config::Settings;
//! use recap::pipeline::{AssistRequest, Pipeline, ResponseEmitter};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let (emitter, mut events) =
//!         ResponseEmitter::channel(&settings.streaming, CancellationToken::new());
//!     let request = AssistRequest::new(
//!         "https://youtu.be/dQw4w9WgXcQ",
//!         &settings.server.processor_id,
//!         "local",
//!     );
//!     let pipeline = Pipeline::new(settings)?;
//!
//!     tokio::spawn(async move { pipeline.handle(&request, &emitter).await });
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod openai;
pub mod pipeline;
pub mod rate_limit;
pub mod security;
pub mod server;
pub mod summarizer;
pub mod transcript;
pub mod video;

pub use error::{RecapError, Result};
