//! binbin-device — fill level and deposit reporting for one bin.
//!
//! Subcommands:
//! - `run` (default) — poll the distance sensor and report events to the backend
//! - `replay` — feed recorded readings through the detector and print the events

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use binbin_core::{load_dotenv, DeviceConfig};
use binbin_device::replay::{read_samples, replay_events};
use binbin_device::{CommandCamera, CommandSensor, ControlLoop, EventSink, HttpEventSink, LogSink};

// ── CLI ─────────────────────────────────────────────────────────────

/// Bin device: polls the distance sensor and reports fill and deposit events.
#[derive(Parser, Debug)]
#[command(name = "binbin-device", version, about)]
struct Cli {
    /// Path to the device YAML config file.
    #[arg(long, env = "BINBIN_CONFIG", default_value = "config/device.yaml")]
    config: PathBuf,

    /// Log events instead of posting them to the backend.
    #[arg(long, env = "BINBIN_DRY_RUN")]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the sensor and report events until Ctrl-C.
    Run,
    /// Print the events a recording of distances would produce, as JSON lines.
    Replay {
        /// File with one distance (cm) per line.
        #[arg(long)]
        samples: PathBuf,
    },
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = DeviceConfig::from_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, cli.dry_run).await,
        Command::Replay { samples } => replay(&config, &samples),
    }
}

async fn run(config: DeviceConfig, dry_run: bool) -> anyhow::Result<()> {
    config.log_summary();

    let sensor = CommandSensor::from_config(&config)?;
    let camera = CommandCamera::from_config(&config);
    let sink: Box<dyn EventSink> = if dry_run {
        info!("dry run: events are logged, not sent");
        Box::new(LogSink)
    } else {
        Box::new(HttpEventSink::new(
            config.require_backend_base_url()?,
            config.http_timeout,
        )?)
    };

    let mut control = ControlLoop::new(&config, Box::new(sensor), Box::new(camera), sink);
    control.run(shutdown_signal()).await;

    info!("binbin-device exited cleanly");
    Ok(())
}

fn replay(config: &DeviceConfig, samples: &Path) -> anyhow::Result<()> {
    let distances = read_samples(samples)
        .with_context(|| format!("reading samples from {}", samples.display()))?;

    for event in replay_events(config, &distances, chrono::Utc::now())? {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
