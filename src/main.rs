// SPDX-License-Identifier: GPL-3.0-only

use capture_control::CaptureMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "capture-control")]
#[command(about = "Capture admission, batching and panorama sequencing simulator")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Config file (default: ~/.config/capture-control/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory to write saved images and batches into
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fire shutter presses at the admission controller and save queue
    Simulate {
        /// Shooting mode (standard, hdr, expo, focus, burst, nr, ...)
        #[arg(short, long, default_value = "standard")]
        mode: CaptureMode,

        /// Number of shutter presses
        #[arg(short, long, default_value = "10")]
        shots: u32,

        /// Time each save job takes, to make backpressure visible
        #[arg(long, default_value = "0")]
        save_delay_ms: u64,
    },

    /// Run a synthetic gyroscope sweep through a panorama session
    Panorama {
        /// Total yaw the simulated device sweeps through
        #[arg(long, default_value = "150")]
        sweep_deg: f32,

        /// Sweep right-to-left instead of left-to-right
        #[arg(long)]
        reverse: bool,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=capture_control=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate {
            mode,
            shots,
            save_delay_ms,
        } => cli::simulate(config, mode, shots, save_delay_ms, cli.output),
        Commands::Panorama { sweep_deg, reverse } => {
            cli::panorama(config, sweep_deg, reverse, cli.output)
        }
        Commands::Config => cli::print_config(&config),
    }
}
