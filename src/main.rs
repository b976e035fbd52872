//! spdif - software S/PDIF encoder
//!
//! Renders WAV files into biphase-mark coded S/PDIF bitstreams through the
//! same double-buffer streaming path a hardware serializer would drain, and
//! inspects the result.

mod inspect;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spdif_core::{logging, Config};
use std::path::PathBuf;

/// Software S/PDIF encoder
#[derive(Parser)]
#[command(name = "spdif")]
#[command(about = "Encode and inspect IEC 60958 S/PDIF bitstreams")]
struct Cli {
    /// Configuration file (defaults to the user configuration)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a stereo PCM WAV file into a bitstream file
    Render(render::RenderArgs),

    /// Decode a bitstream file and report its contents
    Inspect(inspect::InspectArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, load_error) = match &cli.config {
        Some(path) => {
            let config = Config::load_from(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            (config, None)
        }
        None => match Config::load() {
            Ok(config) => (config, None),
            Err(err) => (Config::default(), Some(err)),
        },
    };

    logging::init(&config.debug);
    if let Some(err) = load_error {
        tracing::warn!("Using default configuration: {}", err);
    }

    match cli.command {
        Commands::Render(args) => {
            let summary = render::execute(&args, &config)?;
            println!(
                "Rendered {} frames of {} at {} Hz into {} frames ({} periods)",
                summary.input_frames, summary.format, summary.rate, summary.output_frames, summary.periods
            );
            println!("Output: {}", args.output.display());
            Ok(())
        }
        Commands::Inspect(args) => {
            let report = inspect::execute(&args)?;
            print!("{}", report);
            Ok(())
        }
    }
}
