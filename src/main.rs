//! `GeoStamp` CLI - serve the HTTP boundary or run the pipeline one-shot

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use geostamp::{IngestMeta, PipelineConfig, StampPipeline};

#[derive(Parser)]
#[command(name = "geostamp")]
#[command(about = "Provenance watermarking for photos with duplicate detection")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Data directory (record file + stored uploads)
    #[arg(long, default_value = "data", global = true)]
    data_dir: PathBuf,

    /// TrueType font for the overlay (built-in face when omitted)
    #[arg(long, global = true)]
    font: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind
        #[arg(short, long, default_value = "127.0.0.1:5000")]
        addr: SocketAddr,
    },

    /// Annotate and record a photo from disk
    Ingest {
        /// Photo file to ingest
        file: PathBuf,

        /// Latitude to stamp
        #[arg(long)]
        lat: Option<String>,

        /// Longitude to stamp
        #[arg(long)]
        lon: Option<String>,

        /// Capture timestamp (normalized when parseable)
        #[arg(long)]
        timestamp: Option<String>,

        /// Free-text note
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Check whether a file matches a previously ingested photo
    Verify {
        /// File to check
        file: PathBuf,
    },

    /// Write all records as CSV to stdout
    Export,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut config = PipelineConfig::default().with_data_dir(&cli.data_dir);
    if let Some(font) = &cli.font {
        config = config.with_font(font);
    }
    let pipeline = StampPipeline::new(config).context("failed to initialize pipeline")?;

    match cli.command {
        Commands::Serve { addr } => geostamp::serve(pipeline, addr).await,
        Commands::Ingest {
            file,
            lat,
            lon,
            timestamp,
            notes,
        } => {
            let bytes =
                std::fs::read(&file).with_context(|| format!("cannot read {}", file.display()))?;
            let hint = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let meta = IngestMeta {
                timestamp,
                latitude: lat,
                longitude: lon,
                notes,
            };
            let receipt = pipeline.ingest(&bytes, hint, &meta)?;
            println!("{}  {}", receipt.fingerprint, receipt.stored_file_name);
            Ok(())
        }
        Commands::Verify { file } => {
            let bytes =
                std::fs::read(&file).with_context(|| format!("cannot read {}", file.display()))?;
            let outcome = pipeline.verify(&bytes)?;
            if let Some(record) = &outcome.record {
                println!("found     {}  {}", outcome.fingerprint, record.stored_file_name);
            } else {
                println!("not found {}", outcome.fingerprint);
            }
            Ok(())
        }
        Commands::Export => {
            let csv = pipeline.export_csv()?;
            let mut stdout = std::io::stdout();
            std::io::Write::write_all(&mut stdout, &csv)?;
            Ok(())
        }
    }
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")
}
