//! Otter: a headless IDE broker exposing LSP code intelligence and DAP
//! debugging to AI agents over MCP, via stdio.

use anyhow::Context;
use clap::Parser;
use otter::config::{CliArgs, Config};
use otter::dispatcher::OtterDispatcher;
use otter::project::Project;
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = Config::load(args).context("loading configuration")?;
    init_tracing(&config.log_level);

    info!(project = %config.project_root.display(), "starting otter");

    let project = Arc::new(Project::open(config).await.context("opening project")?);
    let shutdown_project = project.clone();

    let dispatcher = OtterDispatcher::new(project);
    let service = dispatcher
        .serve(stdio())
        .await
        .context("starting MCP stdio transport")?;

    let result = tokio::select! {
        res = service.waiting() => res.map(|_| ()).context("MCP service loop"),
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, shutting down");
            Ok(())
        }
    };

    shutdown_project.close().await;

    if let Err(err) = &result {
        error!(error = %err, "otter exited with an error");
    }
    result
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
