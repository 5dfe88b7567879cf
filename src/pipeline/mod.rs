//! Assist request pipeline.
//!
//! A request moves through receive, security check, classification, rate
//! limiting, slot acquisition, cache lookup, extraction, summarization, cache
//! store and response. Any stage may end the request with an error, which is
//! streamed to the caller like any other reply.

mod emitter;
mod events;
mod intent;
mod orchestrator;

pub use emitter::{ResponseEmitter, StreamOutcome};
pub use events::{
    AssistRequest, Query, ResponseEvent, Session, ERROR_RESPONSE, FINAL_RESPONSE, GENERATING,
    GREETING_RESPONSE, STATUS, THINKING,
};
pub use intent::Intent;
pub use orchestrator::{render_payload, Pipeline};
