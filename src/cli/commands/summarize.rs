//! Summarize command - run one prompt through the pipeline locally.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{AssistRequest, Pipeline, ResponseEmitter, ResponseEvent, StreamOutcome};
use std::io::Write;
use tokio_util::sync::CancellationToken;

/// Run the summarize command.
pub async fn run_summarize(prompt: &str, session: &str, settings: Settings) -> anyhow::Result<()> {
    preflight::check(Operation::Summarize, &settings)?;

    let request = AssistRequest::new(prompt, &settings.server.processor_id, session);
    let streaming = settings.streaming.clone();
    let pipeline = Pipeline::new(settings)?;

    let cancel = CancellationToken::new();
    let (emitter, mut events) = ResponseEmitter::channel(&streaming, cancel.clone());

    let task = tokio::spawn(async move { pipeline.handle(&request, &emitter).await });

    let spinner = Output::spinner("Starting...");
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ResponseEvent::TextBlock { content, .. }) => spinner.set_message(content),
                Some(ResponseEvent::TextChunk { content, .. }) => {
                    if !spinner.is_finished() {
                        spinner.finish_and_clear();
                        println!();
                    }
                    print!("{}", content);
                    stdout.flush()?;
                }
                Some(ResponseEvent::Done) => println!("\n"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                break;
            }
        }
    }

    spinner.finish_and_clear();
    if task.await? == StreamOutcome::Cancelled {
        Output::warning("Cancelled.");
    }

    Ok(())
}
