//! Wire types for the assist endpoint.

use serde::{Deserialize, Serialize};

/// Stream carrying a finished summary.
pub const FINAL_RESPONSE: &str = "FINAL_RESPONSE";
/// Stream carrying greeting, identity and out-of-scope replies.
pub const GREETING_RESPONSE: &str = "GREETING_RESPONSE";
/// Stream carrying terminal error explanations.
pub const ERROR_RESPONSE: &str = "ERROR_RESPONSE";
/// Event name for progress blocks.
pub const STATUS: &str = "STATUS";

pub const THINKING: &str = "Thinking about your query...";
pub const GENERATING: &str = "Transcript extracted successfully. Generating summary...";

/// Incoming assist request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistRequest {
    pub query: Query,
    pub session: Session,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub prompt: String,
}

/// Caller identity. `activity_id` is the rate-limit partition key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub processor_id: String,
    pub activity_id: String,
    pub request_id: String,
    #[serde(default)]
    pub interactions: Vec<serde_json::Value>,
}

impl AssistRequest {
    /// Build a request for local use (CLI, tests).
    pub fn new(prompt: impl Into<String>, processor_id: &str, activity_id: &str) -> Self {
        let request_id = uuid::Uuid::new_v4().to_string();
        Self {
            query: Query {
                id: request_id.clone(),
                prompt: prompt.into(),
            },
            session: Session {
                processor_id: processor_id.to_string(),
                activity_id: activity_id.to_string(),
                request_id,
                interactions: Vec::new(),
            },
        }
    }
}

/// One event on the response stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseEvent {
    TextBlock { event_name: String, content: String },
    TextChunk { stream: String, content: String },
    Done,
}

impl ResponseEvent {
    /// SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseEvent::TextBlock { .. } => "text_block",
            ResponseEvent::TextChunk { .. } => "text_chunk",
            ResponseEvent::Done => "done",
        }
    }
}
