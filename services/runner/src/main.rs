//! Temporal raster pipeline runner.
//!
//! Loads a JSON run configuration, applies command-line overrides and
//! executes the pipeline: source alignment, block-parallel step
//! execution, output assembly. Exits with code 33 on any pipeline
//! failure so batch schedulers can tell a pipeline error from a crash.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use raster_common::DateFormat;
use temporal_pipeline::{Run, RunConfig, TransformRegistry};

/// Exit code for pipeline failures, distinct from panics and signals.
const EXIT_FAILURE: u8 = 33;

#[derive(Parser, Debug)]
#[command(name = "pipeline-runner")]
#[command(about = "Temporal statistics pipeline for dated raster series")]
struct Args {
    /// Configuration file path; '-' reads JSON from stdin
    #[arg(short, long, default_value = "-")]
    config: String,

    /// Override the directory searched for source files
    #[arg(long)]
    project_dir: Option<PathBuf>,

    /// Override the output directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Override the output filename prefix
    #[arg(long)]
    project_name: Option<String>,

    /// Override the worker pool size
    #[arg(short, long)]
    workers: Option<usize>,

    /// Override the rows per block
    #[arg(long)]
    block_rows: Option<usize>,

    /// Override the minimum mapped-slot ratio per source (0..=1)
    #[arg(long)]
    completeness: Option<f64>,

    /// Override the days aggregated into one frame
    #[arg(long)]
    days_per_frame: Option<u32>,

    /// Override the filename date layout (year_doy or year_month_day)
    #[arg(long)]
    date_format: Option<String>,

    /// Run only the block with this index (debugging)
    #[arg(long)]
    only_block: Option<usize>,

    /// Treat each subdirectory of the project dir as a separate tile
    #[arg(long)]
    multi_tile: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to initialize logging");
        return ExitCode::from(EXIT_FAILURE);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "pipeline run failed");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, args)?;

    let registry = TransformRegistry::with_builtins();

    if args.multi_tile {
        run_tiles(&config, &registry)
    } else {
        run_one(config, &registry)
    }
}

fn load_config(source: &str) -> Result<RunConfig> {
    if source == "-" {
        info!("reading configuration from stdin");
        RunConfig::from_json_reader(&mut std::io::stdin().lock())
            .context("invalid configuration on stdin")
    } else {
        RunConfig::from_json_file(source).with_context(|| format!("invalid configuration {source}"))
    }
}

fn apply_overrides(config: &mut RunConfig, args: &Args) -> Result<()> {
    if let Some(dir) = &args.project_dir {
        config.project_dir = dir.clone();
    }
    if let Some(dir) = &args.out_dir {
        config.output_dir = dir.clone();
    }
    if let Some(name) = &args.project_name {
        config.project_name = name.clone();
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(block_rows) = args.block_rows {
        config.block_rows = block_rows;
    }
    if let Some(completeness) = args.completeness {
        config.completeness_threshold = completeness;
    }
    if let Some(days) = args.days_per_frame {
        config.days_per_frame = days;
    }
    if let Some(format) = &args.date_format {
        config.date_format = parse_date_format(format)?;
    }
    if args.only_block.is_some() {
        config.only_block = args.only_block;
    }
    Ok(())
}

fn parse_date_format(s: &str) -> Result<DateFormat> {
    match s {
        "year_doy" => Ok(DateFormat::YearDoy),
        "year_month_day" => Ok(DateFormat::YearMonthDay),
        other => Err(anyhow!(
            "unknown date format '{other}', expected year_doy or year_month_day"
        )),
    }
}

/// Execute one pipeline run end to end.
fn run_one(config: RunConfig, registry: &TransformRegistry) -> Result<()> {
    let mut run = Run::prepare(config, registry)?;
    let summary = run.execute()?;
    let written = run.write_outputs()?;
    info!(
        blocks = summary.blocks_executed,
        files_skipped = summary.files_skipped,
        outputs = written.len(),
        "run complete"
    );
    Ok(())
}

/// Execute one run per subdirectory of the project dir, mirroring the
/// layout under the output dir.
fn run_tiles(config: &RunConfig, registry: &TransformRegistry) -> Result<()> {
    let mut tiles: Vec<PathBuf> = std::fs::read_dir(&config.project_dir)
        .with_context(|| format!("cannot list {}", config.project_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    tiles.sort();

    if tiles.is_empty() {
        return Err(anyhow!(
            "no tile subdirectories under {}",
            config.project_dir.display()
        ));
    }

    for tile in tiles {
        let name = tile
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("unusable tile directory name {}", tile.display()))?
            .to_string();
        info!(tile = %name, "starting tile");

        let mut tile_config = config.clone();
        tile_config.project_dir = tile.clone();
        tile_config.output_dir = config.output_dir.join(&name);
        run_one(tile_config, registry).with_context(|| format!("tile {name} failed"))?;
    }
    Ok(())
}
