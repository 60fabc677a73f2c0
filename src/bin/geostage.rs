//! Geostage CLI — municipal open-data normalization pipeline.
//!
//! Usage:
//!   geostage run --config city.yaml [--db path] [--staging dir] [--stage districts]
//!   geostage verify --raw file.json --column geometria_wgs84 --staged file.json

use clap::{Parser, Subcommand, ValueEnum};
use geostage::{CityConfig, FidelityValidator, SqliteStore, Stage, StageRunner};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "geostage",
    version,
    about = "Normalization and staging pipeline for municipal open data"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for one city
    Run {
        /// Per-city source configuration (YAML)
        #[arg(long)]
        config: PathBuf,
        /// SQLite database standing in for the remote store
        #[arg(long)]
        db: Option<PathBuf>,
        /// Directory for staged JSON output
        #[arg(long, default_value = "data/processed")]
        staging: PathBuf,
        /// Start at a later stage (earlier output must already be loaded)
        #[arg(long)]
        stage: Option<StageArg>,
    },
    /// Check staged geometry against its raw source within tolerance
    Verify {
        /// Raw source file (JSON array)
        #[arg(long)]
        raw: PathBuf,
        /// Geometry column in the raw records
        #[arg(long)]
        column: String,
        /// Staged file to check
        #[arg(long)]
        staged: PathBuf,
        /// Comparison tolerance in degrees
        #[arg(long, default_value_t = 1e-5)]
        tolerance: f64,
        /// Record indices to check (defaults to the first record)
        #[arg(long)]
        index: Vec<usize>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StageArg {
    Districts,
    Neighbourhoods,
    PointFeatures,
    Indicators,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Districts => Stage::Districts,
            StageArg::Neighbourhoods => Stage::Neighbourhoods,
            StageArg::PointFeatures => Stage::PointFeatures,
            StageArg::Indicators => Stage::Indicators,
        }
    }
}

/// Default database path (~/.local/share/geostage/stage.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("geostage").join("stage.db")
}

async fn cmd_run(
    config: PathBuf,
    db: Option<PathBuf>,
    staging: PathBuf,
    stage: Option<StageArg>,
) -> i32 {
    let config = match CityConfig::from_path(&config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let db_path = db.unwrap_or_else(default_db_path);
    let store = match SqliteStore::open(&db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Error: failed to open store {}: {}", db_path.display(), e);
            return 1;
        }
    };

    let mut runner = match stage {
        Some(stage) => StageRunner::starting_at(store, config, &staging, stage.into()),
        None => StageRunner::new(store, config, &staging),
    };

    let reports = match runner.run_all().await {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    for report in &reports {
        println!(
            "{}: {} built, {} skipped, {} uploaded",
            report.stage, report.built, report.skipped, report.uploaded
        );
        if !report.failing.is_empty() {
            let identifiers: Vec<&str> = report.failing.iter().map(String::as_str).collect();
            println!("  issues: {}", identifiers.join(", "));
        }
    }
    0
}

fn cmd_verify(
    raw: PathBuf,
    column: String,
    staged: PathBuf,
    tolerance: f64,
    index: Vec<usize>,
) -> i32 {
    let validator = FidelityValidator::new(tolerance);
    match validator.validate_files(&raw, &column, &staged, &index) {
        Ok(report) if report.is_clean() => {
            println!("Checked {} record(s): geometry preserved", report.checked.len());
            0
        }
        Ok(report) => {
            eprintln!(
                "Geometry drifted beyond tolerance at record(s): {:?}",
                report.mismatches
            );
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run {
            config,
            db,
            staging,
            stage,
        } => cmd_run(config, db, staging, stage).await,
        Commands::Verify {
            raw,
            column,
            staged,
            tolerance,
            index,
        } => cmd_verify(raw, column, staged, tolerance, index),
    };
    std::process::exit(code);
}
