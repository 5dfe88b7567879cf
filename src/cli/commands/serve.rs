//! Serve command - run the SSE assist endpoint.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use crate::server;
use std::sync::Arc;

/// Run the HTTP server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    preflight::check(Operation::Serve, &settings)?;

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let rate = settings.rate_limit.clone();

    let pipeline = Arc::new(Pipeline::new(settings)?);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Recap Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Assist (SSE)", "POST /assist");
    Output::kv("Health", "GET  /health");
    Output::kv("Stats", "GET  /stats");
    println!();
    Output::kv(
        "Limits",
        &format!(
            "{}/min, {}/hour per session, {} concurrent",
            rate.requests_per_minute, rate.requests_per_hour, rate.max_concurrent
        ),
    );
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    server::serve(listener, pipeline).await?;

    Ok(())
}
