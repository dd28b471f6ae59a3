use std::path::{Path, PathBuf};
use std::process::ExitCode;
use clap::{Parser, Subcommand};
use tracing::error;

use edfkit::{logging, Config, Outcome, Result, Session, TextRenderer};

#[derive(Parser)]
#[command(name = "edfkit", version, about = "Batch management and segmentation of EDF/EDF+ recordings")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Minimum segment duration in seconds
    #[arg(long, global = true)]
    min_duration: Option<f64>,

    /// Start-time tolerance for `similar`, in minutes
    #[arg(long, global = true)]
    tolerance_minutes: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rename recordings to <Name>_<YYYY-MM-DD_HH-MM-SS>
    Rename { dir: PathBuf },
    /// Delete recordings that cannot be decoded
    CheckCorrupted { dir: PathBuf },
    /// Delete files whose content duplicates an earlier file
    Dedup { dir: PathBuf },
    /// List recordings that started close together
    Similar { dir: PathBuf },
    /// Write statistics tables and a text summary
    Stats { dir: PathBuf },
    /// Write only the patient table
    PatientTable { dir: PathBuf },
    /// Rename recordings to random six-digit codes, keeping a mapping CSV
    Randomize { dir: PathBuf },
    /// Remove patient names from the headers
    Anonymize { dir: PathBuf },
    /// Split one recording at its events
    Segment { file: PathBuf },
    /// Show the metadata of one recording
    Info { file: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(min) = cli.min_duration {
        config.min_segment_duration_secs = min;
    }
    if let Some(tolerance) = cli.tolerance_minutes {
        config.start_time_tolerance_minutes = tolerance;
    }
    Ok(config)
}

fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Rename { dir } => {
            print!("{}", Session::new(dir, config)?.rename_files()?.summary());
        }
        Commands::CheckCorrupted { dir } => {
            print!("{}", Session::new(dir, config)?.check_corrupted()?.summary());
        }
        Commands::Dedup { dir } => {
            print!("{}", Session::new(dir, config)?.deduplicate()?.summary());
        }
        Commands::Similar { dir } => {
            let (scan, clusters) = Session::new(dir, config)?.find_similar()?;
            print!("{}", scan.summary());
            if clusters.is_empty() {
                println!("No recordings with similar start times.");
            }
            for cluster in &clusters {
                println!("{}", cluster);
            }
        }
        Commands::Stats { dir } => {
            let run = Session::new(dir, config)?.statistics(&TextRenderer)?;
            print!("{}", run.scan.summary());
            print!("{}", TextRenderer::to_text(&run.report));
            for file in &run.files {
                println!("Wrote {}", file.display());
            }
        }
        Commands::PatientTable { dir } => {
            let (scan, path) = Session::new(dir, config)?.patient_table()?;
            print!("{}", scan.summary());
            println!("Wrote {}", path.display());
        }
        Commands::Randomize { dir } => {
            let (scan, mapping) = Session::new(dir, config)?.randomize_filenames()?;
            print!("{}", scan.summary());
            println!("Mapping saved to {}", mapping.display());
        }
        Commands::Anonymize { dir } => {
            print!("{}", Session::new(dir, config)?.anonymize()?.summary());
        }
        Commands::Segment { file } => {
            let session = Session::new(parent_dir(file), config)?;
            match session.segment(file)? {
                Outcome::Done(segmentation) => {
                    println!("{}", segmentation);
                    println!("Manifest: {}", segmentation.manifest.display());
                }
                Outcome::Skipped(reason) => println!("{}: not split, {}", file.display(), reason),
            }
        }
        Commands::Info { file } => {
            let session = Session::new(parent_dir(file), config)?;
            print!("{}", session.info(file)?);
        }
    }
    Ok(())
}
