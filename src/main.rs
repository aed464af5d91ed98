//! Roshi data collector: timed multi-stream recording to a single container file

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use roshi_record::utils::{self, SystemClock};
use roshi_record::{CancelToken, Settings, SimulatedDevice};

#[derive(Parser, Debug)]
#[command(name = "roshi-record", version, about = "Roshi RealSense data collector")]
struct Args {
    /// Amount of time to record (in seconds)
    #[arg(short = 't', long = "Time", allow_negative_numbers = true)]
    time: Option<i64>,

    /// The file where the data will be saved to
    #[arg(short = 'f', long = "FullFilePath")]
    full_file_path: Option<PathBuf>,

    /// Settings file (defaults to ./roshi.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize error handling and logging; stdout is reserved for progress
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roshi_record=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    // The default filename is stamped here, not when streaming starts
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    let recording =
        utils::resolve_recording_config(args.time, args.full_file_path, &settings, &SystemClock);

    info!(
        "Recording {}s to {}",
        recording.duration_seconds,
        recording.output_path.display()
    );

    let cancel = CancelToken::default();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping recording");
                cancel.cancel();
            }
        })
    };

    let outcome = tokio::task::spawn_blocking(move || {
        let device = SimulatedDevice::from_settings(&settings)?;
        roshi_record::record(&recording, &settings, device, std::io::stdout(), &cancel)
    })
    .await?;
    interrupt.abort();

    match outcome {
        Ok(summary) => {
            info!(
                "Captured {} frames ({})",
                summary.frames.total(),
                summary.frames
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
