use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

mod config;
mod convert;
mod inspect;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("zvid_core", log::LevelFilter::Debug)
        .filter_module("zvid_media", log::LevelFilter::Debug)
        .init();
}

/// Converts video files into zoned RGB565 streams plus raw PCM audio
#[derive(Parser)]
#[command(name = "zvid")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a video file into zone files and a PCM track
    Convert {
        input: PathBuf,

        /// Directory the zone, WAV and PCM files are written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// JSON file overriding the default geometry, frame rate and audio format
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Skip the audio track
        #[arg(long)]
        no_audio: bool,
    },

    /// Print the header of a zone file and check its size
    Inspect { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            output_dir,
            config,
            no_audio,
        } => {
            zvid_media::init()?;
            let config = config::ConvertConfig::load(config.as_deref())?;

            let cancel = CancellationToken::new();
            let cancel_clone = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("interrupted, finalizing outputs");
                    cancel_clone.cancel();
                }
            });

            let job = convert::ConvertJob {
                input,
                output_dir,
                config,
                audio: !no_audio,
            };
            convert::run(job, cancel).await
        }
        Commands::Inspect { path } => {
            let report = inspect::inspect(&path)?;
            println!("{}", report);
            if !report.is_consistent() {
                anyhow::bail!("{} is not a complete zone file", path.display());
            }
            Ok(())
        }
    }
}
