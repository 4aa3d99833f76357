use eyegate::{
    identify, verify, Candidate, CaptureSession, CapturedScan, Config, EnrollmentStore, Eye,
    ImageFileSource,
};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "eyegate")]
#[command(about = "Camera eye-scan authentication engine")]
struct Cli {
    /// Path to a TOML config file (defaults apply without one)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the enrollment data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a scan from frame images and enroll a user
    Enroll {
        #[arg(short, long)]
        username: String,
        /// Frame images; the list cycles if shorter than the sample count
        #[arg(required = true)]
        frames: Vec<PathBuf>,
        #[arg(short, long, value_enum, default_value = "right")]
        eye: EyeArg,
    },
    /// Verify a live scan against one user's stored template
    Verify {
        #[arg(short, long)]
        username: String,
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
    /// Identify a live scan against every active enrollment
    Identify {
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
    /// Report the merged quality of a capture without storing anything
    Quality {
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
    /// List enrolled users
    List,
    /// Remove a user's enrollment
    Remove {
        #[arg(short, long)]
        username: String,
    },
    /// Deactivate a user's enrollment without deleting it
    Deactivate {
        #[arg(short, long)]
        username: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EyeArg {
    Left,
    Right,
}

impl From<EyeArg> for Eye {
    fn from(eye: EyeArg) -> Self {
        match eye {
            EyeArg::Left => Eye::Left,
            EyeArg::Right => Eye::Right,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = Config::load_or_default(cli.config.as_deref())?;
    let store = EnrollmentStore::open(cli.data_dir.clone())?;

    match cli.command {
        Commands::Enroll {
            username,
            frames,
            eye,
        } => {
            let scan = capture_scan(frames, &config)?;
            if scan.quality < config.capture.min_accepted_quality {
                println!(
                    "Scan quality is low ({}). Improve light and try again.",
                    scan.quality
                );
            }

            let record = store.enroll(&username, &scan.scan_data, eye.into())?;
            println!(
                "Enrolled {} (quality {})",
                record.username, record.quality
            );
        }
        Commands::Verify { username, frames } => {
            let record = store.get(&username)?;
            if !record.is_active {
                println!("Warning: enrollment for {} is deactivated", username);
            }

            let scan = capture_scan(frames, &config)?;
            let outcome = verify(&scan.scan_data, &record.template, &config.matcher);
            println!(
                "Verification: {} (confidence {})",
                if outcome.verified { "MATCH" } else { "NO MATCH" },
                outcome.confidence
            );
        }
        Commands::Identify { frames } => {
            let scan = capture_scan(frames, &config)?;
            let records = store.list()?;
            let candidates: Vec<Candidate> = records
                .iter()
                .map(|record| Candidate {
                    user: record.username.clone(),
                    template: record.template.clone(),
                    identity_active: record.is_active,
                })
                .collect();

            match identify(&scan.scan_data, &candidates, &config.matcher) {
                Some(matched) => {
                    store.mark_used(&matched.user)?;
                    println!(
                        "Identified {} (confidence {})",
                        matched.user, matched.confidence
                    );
                }
                None => println!("Eye scan not recognized"),
            }
        }
        Commands::Quality { frames } => {
            let scan = capture_scan(frames, &config)?;
            println!("Merged scan quality: {}", scan.quality);
            if scan.quality < config.capture.min_accepted_quality {
                println!("Below the accepted floor ({}); improve lighting, contrast or focus.",
                    config.capture.min_accepted_quality
                );
            }
        }
        Commands::List => {
            let records = store.list()?;
            if records.is_empty() {
                println!("No users enrolled");
            }
            for record in records {
                println!(
                    "{}  quality {}  {}  enrolled {}  last used {}",
                    record.username,
                    record.quality,
                    if record.is_active { "active" } else { "inactive" },
                    record.enrolled_at.format("%Y-%m-%d"),
                    record
                        .last_used
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "never".to_string()),
                );
            }
        }
        Commands::Remove { username } => {
            store.remove(&username)?;
            println!("Removed enrollment for {}", username);
        }
        Commands::Deactivate { username } => {
            store.deactivate(&username)?;
            println!("Deactivated enrollment for {}", username);
        }
    }

    Ok(())
}

fn capture_scan(frames: Vec<PathBuf>, config: &Config) -> Result<CapturedScan> {
    let source = ImageFileSource::new(frames)?;
    let mut session = CaptureSession::new(source, config.capture.clone());
    Ok(session.capture()?)
}

fn setup_logging(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }
}
