//! HTTP correlation bridge.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                     HTTP BRIDGE                       │
//!                 │                                                       │
//!   Inbound       │  ┌──────────┐    ┌──────────────┐    ┌────────────┐  │
//!   request ──────┼─▶│ inbound  │───▶│request source│───▶│ worker pool│──┼──▶ pipeline
//!                 │  │ server   │    │ (parked)     │    │ (dispatch) │  │
//!   reply ◀───────┼──│          │◀───│              │◀───┼────────────┼──┼─── response sink
//!                 │  └──────────┘    └──────────────┘    └────────────┘  │
//!                 │                                                       │
//!   pipeline ─────┼─▶ request sink ──▶ transport ──────────────────────────┼──▶ Backend
//!                 │                         │                             │
//!   pipeline ◀────┼── response source ◀── registry ◀── delivery (pool) ◀──┼─── response
//!                 └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use http_bridge::config::load_config;
use http_bridge::event::LoggingConsumer;
use http_bridge::http::InboundServer;
use http_bridge::lifecycle::{signals, Shutdown};
use http_bridge::observability::{logging, metrics};
use http_bridge::pipeline::{BridgeContext, Pipeline};

#[derive(Parser, Debug)]
#[command(name = "http-bridge", version, about = "HTTP request/response correlation bridge")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "http-bridge.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = %cli.config.display(), "http-bridge starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let ctx = BridgeContext::from_config(&config);
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let mut pipelines: Vec<Pipeline> = Vec::with_capacity(config.pipelines.len());
    for pipeline_config in &config.pipelines {
        let started = Pipeline::from_config(pipeline_config, |element| {
            Arc::new(LoggingConsumer::new(format!(
                "{}/{}",
                pipeline_config.name,
                element.owner_id()
            )))
        })
        .and_then(|mut pipeline| pipeline.start(&ctx).map(|()| pipeline));

        match started {
            Ok(pipeline) => pipelines.push(pipeline),
            Err(e) => {
                for pipeline in pipelines.iter_mut().rev() {
                    pipeline.shutdown();
                }
                return Err(e.into());
            }
        }
    }

    let shutdown = Shutdown::new();
    let stopped = shutdown.wait();
    tokio::spawn(signals::trigger_on_signal(shutdown.clone()));

    let mut server = tokio::spawn(InboundServer::new(Arc::clone(&ctx.routes)).run(listener, shutdown.wait()));

    let early_exit = tokio::select! {
        _ = stopped => None,
        result = &mut server => Some(result),
    };

    // Releases parked inbound requests before the server drains.
    for pipeline in pipelines.iter_mut().rev() {
        pipeline.shutdown();
    }
    ctx.pool.close();

    match early_exit {
        Some(result) => result??,
        None => server.await??,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
