//! Request orchestrator for Recap.
//!
//! Runs one assist request through validation, classification, admission,
//! cache lookup, extraction, summarization and streaming, in that order.

use super::emitter::{ResponseEmitter, StreamOutcome};
use super::events::{AssistRequest, FINAL_RESPONSE, GENERATING, GREETING_RESPONSE, THINKING};
use super::intent::Intent;
use crate::cache::SummaryCache;
use crate::config::{Prompts, ReplyPrompts, Settings};
use crate::error::{RecapError, Result};
use crate::rate_limit::RateLimiter;
use crate::security::{sanitize_for_log, SecurityValidator};
use crate::summarizer::{OpenAiSummarizer, Summarizer};
use crate::transcript::{ExtractionFailure, TranscriptExtractor, YtDlpExtractor};
use crate::video::VideoId;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// The main request pipeline.
pub struct Pipeline {
    settings: Settings,
    prompts: Prompts,
    validator: SecurityValidator,
    limiter: Arc<RateLimiter>,
    cache: Arc<SummaryCache>,
    extractor: Arc<dyn TranscriptExtractor>,
    summarizer: Arc<dyn Summarizer>,
}

impl Pipeline {
    /// Create a pipeline with production collaborators built from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let limiter = Arc::new(RateLimiter::new(settings.rate_limit.clone()));
        let cache = Arc::new(SummaryCache::new(&settings.cache_path(), settings.cache.ttl())?);
        let extractor: Arc<dyn TranscriptExtractor> =
            Arc::new(YtDlpExtractor::new(&settings.transcript));
        let summarizer: Arc<dyn Summarizer> = Arc::new(OpenAiSummarizer::new(
            settings.summarizer.clone(),
            prompts.clone(),
        )?);

        info!(
            "Pipeline ready (model {}, {} max concurrent)",
            settings.summarizer.model, settings.rate_limit.max_concurrent
        );

        Ok(Self::with_components(
            settings, prompts, limiter, cache, extractor, summarizer,
        ))
    }

    /// Create a pipeline with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        limiter: Arc<RateLimiter>,
        cache: Arc<SummaryCache>,
        extractor: Arc<dyn TranscriptExtractor>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        let validator = SecurityValidator::with_settings(&settings.security);
        Self {
            settings,
            prompts,
            validator,
            limiter,
            cache,
            extractor,
            summarizer,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn cache(&self) -> &Arc<SummaryCache> {
        &self.cache
    }

    /// Handle one request, streaming its response through `emitter`.
    ///
    /// Terminal errors are rendered onto the error stream; the returned
    /// outcome only says whether the client received the whole response.
    #[instrument(
        skip_all,
        fields(request_id = %sanitize_for_log(&request.session.request_id, 64))
    )]
    pub async fn handle(&self, request: &AssistRequest, emitter: &ResponseEmitter) -> StreamOutcome {
        match self.run(request, emitter).await {
            Ok(outcome) => {
                if outcome.is_cancelled() {
                    info!("Client disconnected before the response completed");
                }
                outcome
            }
            Err(err) => {
                log_terminal_error(&err);
                emitter.error(&err).await
            }
        }
    }

    async fn run(&self, request: &AssistRequest, emitter: &ResponseEmitter) -> Result<StreamOutcome> {
        if request.session.processor_id != self.settings.server.processor_id {
            return Err(RecapError::InvalidRequest(format!(
                "Unknown processor '{}'",
                sanitize_for_log(&request.session.processor_id, 64)
            )));
        }

        let prompt = request.query.prompt.as_str();
        debug!("Received prompt: {}", sanitize_for_log(prompt, 120));

        if let Some(finding) = self.validator.check(prompt) {
            return Err(RecapError::SecurityViolation(finding));
        }

        let (url, video) = match Intent::classify(prompt) {
            Intent::Greeting => return Ok(self.reply(emitter, &self.prompts.replies.greeting).await),
            Intent::Identity => return Ok(self.reply(emitter, &self.prompts.replies.identity).await),
            Intent::OutOfScope => {
                return Ok(self.reply(emitter, &self.prompts.replies.out_of_scope).await)
            }
            Intent::MalformedVideoUrl { url } => return Err(RecapError::InvalidVideoUrl(url)),
            Intent::VideoSummary { url, video } => (url, video),
        };

        self.limiter.check(&request.session.activity_id)?;

        let slot = self.limiter.acquire_slot()?;
        let outcome = self.summarize_video(&url, &video, emitter).await;
        self.limiter.release(slot);

        outcome
    }

    async fn reply(&self, emitter: &ResponseEmitter, options: &[String]) -> StreamOutcome {
        let text = ReplyPrompts::pick(options);
        emitter.respond(GREETING_RESPONSE, THINKING, &text).await
    }

    /// Cache lookup, extraction, summarization and delivery. Runs under a slot.
    #[instrument(skip(self, url, emitter), fields(video_id = %video))]
    async fn summarize_video(
        &self,
        url: &str,
        video: &VideoId,
        emitter: &ResponseEmitter,
    ) -> Result<StreamOutcome> {
        if let Some(payload) = self.cache.get(video.as_str()) {
            info!("Serving cached summary");
            return Ok(emitter.respond(FINAL_RESPONSE, GENERATING, &payload).await);
        }

        if emitter.status(THINKING).await.is_cancelled() {
            return Ok(StreamOutcome::Cancelled);
        }

        let cancel = emitter.cancellation().clone();

        let transcript = tokio::select! {
            _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
            fetched = self.extractor.fetch(video) => fetched.map_err(as_extraction_error)?,
        };

        let summary = tokio::select! {
            _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
            summary = self.summarizer.summarize(&transcript) => summary.map_err(as_summary_error)?,
        };

        let payload = render_payload(&summary, video);
        self.cache
            .put(video.as_str(), &payload, Some(url), self.cache.default_ttl());

        Ok(emitter.respond(FINAL_RESPONSE, GENERATING, &payload).await)
    }
}

/// Summary plus a footer naming the canonical watch URL.
pub fn render_payload(summary: &str, video: &VideoId) -> String {
    format!(
        "{}\n\n---\n*Summarized from: {}*",
        summary.trim_end(),
        video.watch_url()
    )
}

fn as_extraction_error(err: RecapError) -> RecapError {
    match err {
        RecapError::ExtractionFailed(_) => err,
        other => {
            warn!("Transcript extractor error: {}", other);
            RecapError::ExtractionFailed(ExtractionFailure::Other(other.to_string()))
        }
    }
}

fn as_summary_error(err: RecapError) -> RecapError {
    match err {
        RecapError::SummarizationFailed(_) => err,
        other => RecapError::SummarizationFailed(other.to_string()),
    }
}

fn log_terminal_error(err: &RecapError) {
    let code = err.code();
    match err {
        RecapError::SecurityViolation(finding) => {
            warn!(code, "Rejected prompt: {}", sanitize_for_log(&finding.to_string(), 120))
        }
        RecapError::RateLimited { retry_after } => {
            info!(code, "Rate limited for {}s", retry_after.as_secs())
        }
        RecapError::CapacityExceeded { .. }
        | RecapError::InvalidRequest(_)
        | RecapError::InvalidVideoUrl(_) => info!(code, "Request rejected: {}", err),
        RecapError::ExtractionFailed(_) => warn!(code, "{}", err),
        _ => error!(code, "Request failed: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RateLimitSettings, StreamingSettings};
    use crate::pipeline::events::{ResponseEvent, ERROR_RESPONSE, STATUS};
    use crate::transcript::{CaptionSegment, Transcript};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    enum Behavior {
        Succeed,
        Fail(ExtractionFailure),
        Hang,
    }

    struct StubExtractor {
        calls: AtomicUsize,
        behavior: Behavior,
    }

    impl StubExtractor {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                behavior,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TranscriptExtractor for StubExtractor {
        async fn fetch(&self, video: &VideoId) -> Result<Transcript> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Succeed => Ok(Transcript::new(
                    video.to_string(),
                    vec![CaptionSegment::new(0.0, 3.0, "Never gonna give you up".to_string())],
                )),
                Behavior::Fail(failure) => Err(RecapError::ExtractionFailed(failure.clone())),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    #[derive(Default)]
    struct StubSummarizer {
        calls: AtomicUsize,
        failure: Option<String>,
        body_chars: usize,
    }

    impl StubSummarizer {
        fn failing(reason: &str) -> Self {
            Self {
                failure: Some(reason.to_string()),
                ..Default::default()
            }
        }

        fn with_body(body_chars: usize) -> Self {
            Self {
                body_chars,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Summarizer for StubSummarizer {
        async fn summarize(&self, transcript: &Transcript) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(reason) = &self.failure {
                return Err(RecapError::SummarizationFailed(reason.clone()));
            }
            Ok(format!(
                "## General Summary\n\nCall {} for {}{}",
                n,
                transcript.video_id,
                "x".repeat(self.body_chars)
            ))
        }
    }

    struct Harness {
        pipeline: Arc<Pipeline>,
        extractor: Arc<StubExtractor>,
        summarizer: Arc<StubSummarizer>,
    }

    fn harness(behavior: Behavior, rate_limit: RateLimitSettings) -> Harness {
        harness_with(behavior, rate_limit, StubSummarizer::default())
    }

    fn harness_with(
        behavior: Behavior,
        rate_limit: RateLimitSettings,
        summarizer: StubSummarizer,
    ) -> Harness {
        let settings = Settings {
            rate_limit: rate_limit.clone(),
            ..Default::default()
        };
        let extractor = StubExtractor::new(behavior);
        let summarizer = Arc::new(summarizer);

        let pipeline = Pipeline::with_components(
            settings,
            Prompts::default(),
            Arc::new(RateLimiter::new(rate_limit)),
            Arc::new(SummaryCache::in_memory(Duration::from_secs(3600)).unwrap()),
            extractor.clone(),
            summarizer.clone(),
        );

        Harness {
            pipeline: Arc::new(pipeline),
            extractor,
            summarizer,
        }
    }

    fn emitter(cancel: CancellationToken) -> (ResponseEmitter, mpsc::Receiver<ResponseEvent>) {
        let streaming = StreamingSettings {
            chunk_chars: 64,
            chunk_delay_ms: 0,
        };
        ResponseEmitter::channel(&streaming, cancel)
    }

    async fn send(pipeline: &Pipeline, prompt: &str, session: &str) -> (StreamOutcome, Vec<ResponseEvent>) {
        let (emitter, mut rx) = emitter(CancellationToken::new());
        let request = AssistRequest::new(prompt, "recap", session);

        let outcome = pipeline.handle(&request, &emitter).await;
        drop(emitter);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (outcome, events)
    }

    fn stream_text(events: &[ResponseEvent], name: &str) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                ResponseEvent::TextChunk { stream, content } if stream == name => {
                    Some(content.as_str())
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_second_request_served_from_cache() {
        let h = harness(Behavior::Succeed, RateLimitSettings::default());

        let (first_outcome, first) = send(&h.pipeline, VIDEO_URL, "s1").await;
        let (_, second) = send(&h.pipeline, "https://youtu.be/dQw4w9WgXcQ", "s2").await;

        assert_eq!(first_outcome, StreamOutcome::Completed);
        let payload = stream_text(&first, FINAL_RESPONSE);
        assert!(payload.ends_with(&format!("---\n*Summarized from: {}*", VIDEO_URL)));
        assert_eq!(payload, stream_text(&second, FINAL_RESPONSE));

        assert_eq!(h.extractor.calls(), 1);
        assert_eq!(h.summarizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.pipeline.limiter().platform_stats().in_use, 0);
    }

    #[tokio::test]
    async fn test_events_are_ordered() {
        let h = harness(Behavior::Succeed, RateLimitSettings::default());
        let (_, events) = send(&h.pipeline, VIDEO_URL, "s1").await;

        assert!(matches!(
            &events[0],
            ResponseEvent::TextBlock { event_name, content } if event_name == STATUS && content == THINKING
        ));
        assert!(matches!(
            &events[1],
            ResponseEvent::TextBlock { content, .. } if content == GENERATING
        ));
        assert!(events[2..events.len() - 1]
            .iter()
            .all(|e| matches!(e, ResponseEvent::TextChunk { .. })));
        assert_eq!(events.last(), Some(&ResponseEvent::Done));
        assert_eq!(events.iter().filter(|e| **e == ResponseEvent::Done).count(), 1);
    }

    #[tokio::test]
    async fn test_greetings_bypass_admission() {
        let h = harness(Behavior::Succeed, RateLimitSettings::default());

        for _ in 0..20 {
            let (outcome, events) = send(&h.pipeline, "hello", "s1").await;
            assert_eq!(outcome, StreamOutcome::Completed);
            assert!(!stream_text(&events, GREETING_RESPONSE).is_empty());
        }
        let (_, events) = send(&h.pipeline, "Who are you?", "s1").await;
        assert!(!stream_text(&events, GREETING_RESPONSE).is_empty());

        let stats = h.pipeline.limiter().session_stats("s1");
        assert_eq!(stats.requests_last_hour, 0);
        assert_eq!(h.extractor.calls(), 0);
    }

    #[tokio::test]
    async fn test_out_of_scope_gets_canned_reply() {
        let h = harness(Behavior::Succeed, RateLimitSettings::default());
        let (_, events) = send(&h.pipeline, "What is the capital of France?", "s1").await;

        let reply = stream_text(&events, GREETING_RESPONSE);
        assert!(h.pipeline.prompts.replies.out_of_scope.contains(&reply));
    }

    #[tokio::test]
    async fn test_security_violation_stops_before_collaborators() {
        let h = harness(Behavior::Succeed, RateLimitSettings::default());
        let prompt = format!("{}'; DROP TABLE users; --", VIDEO_URL);

        let (outcome, events) = send(&h.pipeline, &prompt, "s1").await;
        assert_eq!(outcome, StreamOutcome::Completed);
        assert!(stream_text(&events, ERROR_RESPONSE).starts_with("**Security Alert"));
        assert_eq!(h.extractor.calls(), 0);
        assert_eq!(h.pipeline.limiter().session_stats("s1").requests_last_hour, 0);
    }

    #[tokio::test]
    async fn test_wrong_processor_is_invalid_request() {
        let h = harness(Behavior::Succeed, RateLimitSettings::default());
        let (emitter, mut rx) = emitter(CancellationToken::new());
        let request = AssistRequest::new(VIDEO_URL, "someone-else", "s1");

        h.pipeline.handle(&request, &emitter).await;
        drop(emitter);

        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        assert!(stream_text(&events, ERROR_RESPONSE).starts_with("**Invalid Request**"));
        assert_eq!(h.extractor.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_url_is_not_rate_limited() {
        let h = harness(Behavior::Succeed, RateLimitSettings::default());
        let (_, events) = send(&h.pipeline, "https://www.youtube.com/watch?v=short", "s1").await;

        assert!(stream_text(&events, ERROR_RESPONSE).starts_with("**Invalid YouTube URL**"));
        assert_eq!(h.pipeline.limiter().session_stats("s1").requests_last_hour, 0);
    }

    #[tokio::test]
    async fn test_eleventh_video_request_is_rate_limited() {
        let h = harness(Behavior::Succeed, RateLimitSettings::default());

        for _ in 0..10 {
            let (_, events) = send(&h.pipeline, VIDEO_URL, "s1").await;
            assert!(stream_text(&events, ERROR_RESPONSE).is_empty());
        }

        let (_, events) = send(&h.pipeline, VIDEO_URL, "s1").await;
        let error = stream_text(&events, ERROR_RESPONSE);
        assert!(error.starts_with("**Rate Limit Exceeded**"));
        assert!(error.contains("seconds"));

        // Another session is unaffected.
        let (_, events) = send(&h.pipeline, VIDEO_URL, "s2").await;
        assert!(!stream_text(&events, FINAL_RESPONSE).is_empty());
    }

    #[tokio::test]
    async fn test_capacity_rejection_without_queueing() {
        let rate_limit = RateLimitSettings {
            max_concurrent: 1,
            ..Default::default()
        };
        let h = harness(Behavior::Succeed, rate_limit);
        let held = h.pipeline.limiter().acquire_slot().unwrap();

        let (_, events) = send(&h.pipeline, VIDEO_URL, "s1").await;
        assert!(stream_text(&events, ERROR_RESPONSE).starts_with("**Platform At Capacity**"));
        assert_eq!(h.extractor.calls(), 0);

        drop(held);
        let (_, events) = send(&h.pipeline, VIDEO_URL, "s1").await;
        assert!(!stream_text(&events, FINAL_RESPONSE).is_empty());
    }

    #[tokio::test]
    async fn test_extraction_failure_releases_slot_and_skips_cache() {
        let h = harness(
            Behavior::Fail(ExtractionFailure::NoCaptions),
            RateLimitSettings::default(),
        );

        let (_, events) = send(&h.pipeline, VIDEO_URL, "s1").await;
        let error = stream_text(&events, ERROR_RESPONSE);
        assert!(error.contains("No English captions available for this video"));
        assert_eq!(events.last(), Some(&ResponseEvent::Done));

        assert_eq!(h.summarizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.pipeline.limiter().platform_stats().in_use, 0);
        assert_eq!(h.pipeline.cache().stats().unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_cancellation_mid_extraction_releases_slot() {
        let h = harness(Behavior::Hang, RateLimitSettings::default());
        let cancel = CancellationToken::new();
        let (emitter, mut rx) = emitter(cancel.clone());

        let pipeline = h.pipeline.clone();
        let task = tokio::spawn(async move {
            let request = AssistRequest::new(VIDEO_URL, "recap", "s1");
            pipeline.handle(&request, &emitter).await
        });

        // The THINKING block is sent right before extraction starts.
        assert!(rx.recv().await.is_some());
        while h.extractor.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.pipeline.limiter().platform_stats().in_use, 1);

        cancel.cancel();
        let outcome = task.await.unwrap();

        assert_eq!(outcome, StreamOutcome::Cancelled);
        assert_eq!(h.pipeline.limiter().platform_stats().in_use, 0);
        assert_eq!(h.summarizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.pipeline.cache().stats().unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_summarizer_failure_releases_slot_and_skips_cache() {
        let h = harness_with(
            Behavior::Succeed,
            RateLimitSettings::default(),
            StubSummarizer::failing("model returned no content"),
        );

        let (outcome, events) = send(&h.pipeline, VIDEO_URL, "s1").await;
        assert_eq!(outcome, StreamOutcome::Completed);

        let error = stream_text(&events, ERROR_RESPONSE);
        assert!(error.starts_with("**Failed to generate summary**"));
        assert!(error.contains("model returned no content"));
        assert!(stream_text(&events, FINAL_RESPONSE).is_empty());
        assert_eq!(events.last(), Some(&ResponseEvent::Done));

        assert_eq!(h.pipeline.limiter().platform_stats().in_use, 0);
        assert_eq!(h.pipeline.cache().stats().unwrap().total_entries, 0);

        // Nothing was cached, so the next request extracts again.
        send(&h.pipeline, VIDEO_URL, "s1").await;
        assert_eq!(h.extractor.calls(), 2);
        assert_eq!(h.summarizer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disconnect_mid_stream_releases_slot_once() {
        let h = harness_with(
            Behavior::Succeed,
            RateLimitSettings::default(),
            StubSummarizer::with_body(500),
        );
        let streaming = StreamingSettings {
            chunk_chars: 4,
            chunk_delay_ms: 5,
        };
        let (emitter, mut rx) = ResponseEmitter::channel(&streaming, CancellationToken::new());

        let pipeline = h.pipeline.clone();
        let task = tokio::spawn(async move {
            let request = AssistRequest::new(VIDEO_URL, "recap", "s1");
            pipeline.handle(&request, &emitter).await
        });

        let mut chunks = 0;
        while chunks < 3 {
            match rx.recv().await {
                Some(ResponseEvent::TextChunk { .. }) => chunks += 1,
                Some(_) => {}
                None => panic!("stream ended before any chunks"),
            }
        }
        assert_eq!(h.pipeline.limiter().platform_stats().in_use, 1);

        drop(rx);
        let outcome = task.await.unwrap();

        assert_eq!(outcome, StreamOutcome::Cancelled);
        assert_eq!(h.pipeline.limiter().platform_stats().in_use, 0);
        // The summary was complete before streaming began.
        assert_eq!(h.pipeline.cache().stats().unwrap().total_entries, 1);
    }

    #[test]
    fn test_render_payload_footer() {
        let video = VideoId::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(
            render_payload("Summary\n\n", &video),
            "Summary\n\n---\n*Summarized from: https://www.youtube.com/watch?v=dQw4w9WgXcQ*"
        );
    }
}
