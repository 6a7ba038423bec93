use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{persist, EncodedImage, ModelSelector, OnnxFaceComparator};
use rollcall_gate::{
    AttendanceGate, AttendanceLedger, AttendanceRecord, Config, EngineHandle, LedgerError,
    MarkOutcome, MarkRequest,
};

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-verified attendance marking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an image file as a data URI
    Encode {
        /// Image file (PNG, JPEG, ...)
        image: PathBuf,
    },
    /// Store a user's reference photo
    Enroll {
        #[arg(short, long)]
        user: u64,
        /// File holding a data URI, or "-" for stdin
        #[arg(short, long)]
        capture: PathBuf,
    },
    /// Check a capture against a user's reference photo
    Verify {
        #[arg(short, long)]
        user: u64,
        /// File holding a data URI, or "-" for stdin
        #[arg(short, long)]
        capture: PathBuf,
        /// Reference image (defaults to the user's enrolled reference)
        #[arg(short, long)]
        reference: Option<PathBuf>,
    },
    /// Verify a capture and record attendance for a unit
    Mark {
        #[arg(short, long)]
        user: u64,
        #[arg(long)]
        unit: u64,
        /// File holding a data URI, or "-" for stdin
        #[arg(short, long)]
        capture: PathBuf,
    },
    /// Delete a user's reference photo and captures
    Remove {
        #[arg(short, long)]
        user: u64,
    },
    /// Show the effective configuration
    Status,
}

/// Prints each accepted attendance record as one JSON line.
struct StdoutLedger;

impl AttendanceLedger for StdoutLedger {
    fn record(&self, record: &AttendanceRecord) -> Result<(), LedgerError> {
        let line = serde_json::to_string(record).map_err(|e| LedgerError(e.to_string()))?;
        println!("{line}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let layout = config.layout();
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Encode { image } => {
            let format = image::ImageFormat::from_path(&image)
                .with_context(|| format!("unrecognized image type: {}", image.display()))?;
            let bytes = std::fs::read(&image).with_context(|| format!("reading {}", image.display()))?;
            println!("{}", EncodedImage::from_bytes(format.to_mime_type(), bytes).to_data_uri());
        }
        Commands::Enroll { user, capture } => {
            let data_uri = read_data_uri(&capture)?;
            let path = persist(&data_uri, layout.reference_path(user))
                .with_context(|| format!("enrolling reference for user {user}"))?;
            println!("{}", path.display());
        }
        Commands::Verify { user, capture, reference } => {
            let data_uri = read_data_uri(&capture)?;
            let reference = reference.unwrap_or_else(|| layout.reference_path(user));
            let engine = engine(&config, Arc::new(StdoutLedger))?;

            let verified = engine.verify(data_uri, Some(reference)).await;
            println!("{}", serde_json::json!({ "user_id": user, "verified": verified }));
            if !verified {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Mark { user, unit, capture } => {
            let request = MarkRequest {
                user_id: user,
                unit_id: unit,
                capture: read_data_uri(&capture)?,
                reference: Some(layout.reference_path(user)),
            };
            let engine = engine(&config, Arc::new(StdoutLedger))?;

            let outcome = engine
                .mark_attendance(request)
                .await
                .context("recording attendance")?;
            eprintln!("{}", outcome.message());
            if outcome == MarkOutcome::NotRecognized {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Remove { user } => {
            let removed = layout
                .remove_user(user)
                .with_context(|| format!("removing face data for user {user}"))?;
            println!("{}", serde_json::json!({ "user_id": user, "removed": removed }));
        }
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn engine(config: &Config, ledger: Arc<dyn AttendanceLedger>) -> Result<EngineHandle> {
    let comparator =
        OnnxFaceComparator::load(&config.model_dir, ModelSelector::default(), config.similarity_threshold)
            .with_context(|| format!("loading face models from {}", config.model_dir.display()))?;
    let gate = AttendanceGate::from_config(config, Arc::new(comparator), ledger);
    Ok(EngineHandle::from_config(gate, config))
}

fn read_data_uri(source: &Path) -> Result<String> {
    let raw = if source == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading data URI from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading {}", source.display()))?
    };
    Ok(raw.trim().to_string())
}
