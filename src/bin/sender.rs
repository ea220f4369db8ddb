//! AES67 Sender
//!
//! Transmits a large channel count as PTP-synchronized multicast RTP
//! streams, one stream per channel sub-range.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aes67_sender::{
    clock::SystemClockService,
    config::SenderConfig,
    orchestrator::{ExitReason, Orchestrator},
    pipeline::RtpEngine,
};

#[derive(Parser, Debug)]
#[command(name = "aes67-sender", about = "PTP-synchronized AES67 multicast audio sender")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "aes67-config.json")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!("Starting AES67 sender");

    let config = match SenderConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        "Sending {} channels in groups of {} from {}:{} (PTP domain {})",
        config.channel_count,
        config.channels_per_receiver,
        config.base_multicast_address,
        config.rtp_destination_port,
        config.ptp_domain
    );

    let orchestrator = Orchestrator::new(
        config,
        Arc::new(SystemClockService::new()),
        Arc::new(RtpEngine::new()),
    );

    match orchestrator.run().await {
        Ok(ExitReason::Completed) => ExitCode::SUCCESS,
        Ok(ExitReason::Failed) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))
}
