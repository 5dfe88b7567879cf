//! Ordered, cancellable response streaming.
//!
//! Every send is a checkpoint. Once the receiver is gone or the cancellation
//! token has fired, nothing further is emitted and the caller sees
//! [`StreamOutcome::Cancelled`].

use super::events::{ResponseEvent, ERROR_RESPONSE, STATUS, THINKING};
use crate::config::StreamingSettings;
use crate::error::RecapError;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const EVENT_BUFFER: usize = 64;

/// How a response stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Cancelled,
}

impl StreamOutcome {
    pub fn is_cancelled(self) -> bool {
        self == StreamOutcome::Cancelled
    }
}

/// Sends [`ResponseEvent`]s to one client.
#[derive(Debug, Clone)]
pub struct ResponseEmitter {
    tx: mpsc::Sender<ResponseEvent>,
    cancel: CancellationToken,
    chunk_chars: usize,
    chunk_delay: Duration,
}

impl ResponseEmitter {
    pub fn new(
        tx: mpsc::Sender<ResponseEvent>,
        cancel: CancellationToken,
        settings: &StreamingSettings,
    ) -> Self {
        Self {
            tx,
            cancel,
            chunk_chars: settings.chunk_chars.max(1),
            chunk_delay: Duration::from_millis(settings.chunk_delay_ms),
        }
    }

    /// Emitter plus the receiving half of a fresh event channel.
    pub fn channel(
        settings: &StreamingSettings,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<ResponseEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        (Self::new(tx, cancel, settings), rx)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the client has gone away.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    async fn send(&self, event: ResponseEvent) -> StreamOutcome {
        if self.is_cancelled() {
            return StreamOutcome::Cancelled;
        }

        tokio::select! {
            _ = self.cancel.cancelled() => StreamOutcome::Cancelled,
            sent = self.tx.send(event) => match sent {
                Ok(()) => StreamOutcome::Completed,
                Err(_) => {
                    debug!("Response receiver dropped");
                    StreamOutcome::Cancelled
                }
            },
        }
    }

    /// Emit a progress block.
    pub async fn status(&self, content: &str) -> StreamOutcome {
        self.send(ResponseEvent::TextBlock {
            event_name: STATUS.to_string(),
            content: content.to_string(),
        })
        .await
    }

    /// Emit `text` on `stream` as ordered chunks of at most `chunk_chars` characters.
    pub async fn stream_text(&self, stream: &str, text: &str) -> StreamOutcome {
        let pieces = split_chars(text, self.chunk_chars);
        let last = pieces.len().saturating_sub(1);

        for (idx, piece) in pieces.into_iter().enumerate() {
            let outcome = self
                .send(ResponseEvent::TextChunk {
                    stream: stream.to_string(),
                    content: piece.to_string(),
                })
                .await;
            if outcome.is_cancelled() {
                return outcome;
            }

            if idx < last && !self.chunk_delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return StreamOutcome::Cancelled,
                    _ = tokio::time::sleep(self.chunk_delay) => {}
                }
            }
        }

        StreamOutcome::Completed
    }

    /// Terminal event.
    pub async fn done(&self) -> StreamOutcome {
        self.send(ResponseEvent::Done).await
    }

    /// Status block, the payload as chunks, then `done`.
    pub async fn respond(&self, stream: &str, status: &str, payload: &str) -> StreamOutcome {
        if self.status(status).await.is_cancelled()
            || self.stream_text(stream, payload).await.is_cancelled()
        {
            return StreamOutcome::Cancelled;
        }
        self.done().await
    }

    /// Stream the explanation for a terminal error.
    pub async fn error(&self, err: &RecapError) -> StreamOutcome {
        let (title, details) = err.user_message();
        let message = format!("**{}**\n\n{}", title, details);
        self.respond(ERROR_RESPONSE, THINKING, &message).await
    }
}

/// Split on character boundaries. Empty input yields a single empty piece.
fn split_chars(text: &str, size: usize) -> Vec<&str> {
    if text.is_empty() {
        return vec![""];
    }

    let size = size.max(1);
    let mut pieces = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(size)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        pieces.push(head);
        rest = tail;
    }
    pieces
}
