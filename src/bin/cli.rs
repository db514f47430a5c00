//! run-congestion CLI - course congestion report for multi-event races
//!
//! Usage:
//!   run-congestion overlap <pace.csv> <overlaps.csv> -s Full=420 -s 10K=440 -s Half=460
//!   run-congestion overlap <pace.csv> <overlaps.csv> -s ... --segments 10K:5.81-8.10 --verbose
//!   run-congestion density <pace.csv> -s ... --segment 10K,Half,0.00,2.74,3.0,uni
//!
//! `overlap` reads runner paces and the shared-segment catalogue, analyses
//! every selected segment and prints a ranked summary. `--export-summary`
//! writes the same rows as CSV (or JSON with `--json`).
//!
//! `density` counts concurrent runners per step of each given segment and
//! prints zone distances and the 0-10 congestion index.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use run_congestion::{
    analyze, analyze_density, parse_start_times, read_roster, read_segments,
    render_density_block, render_segment, render_summary, write_summary_csv, AnalysisConfig,
    DensityConfig, DensitySegment, RankBy, Roster, SegmentSelector, SummaryRecord,
};

#[derive(Parser)]
#[command(name = "run-congestion")]
#[command(about = "Detect where runners of different events share the course", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank shared segments by cross-event overlap
    Overlap(OverlapArgs),

    /// Runner density, zones and congestion index per segment
    Density(DensityArgs),
}

#[derive(Args)]
struct OverlapArgs {
    /// Pace CSV (event, runner_id, pace, distance)
    pace_csv: PathBuf,

    /// Overlaps CSV (event, start, end, overlapswith, description)
    overlaps_csv: PathBuf,

    /// Event start time as Event=minutes_since_midnight (repeatable)
    #[arg(short = 's', long = "start-times", num_args = 1.., required = true)]
    start_times: Vec<String>,

    /// Overlap window in seconds
    #[arg(long, default_value = "60")]
    time_window: f64,

    /// Checkpoint spacing in kilometers
    #[arg(long, default_value = "0.01")]
    step: f64,

    /// Coarse pass spacing as a multiple of --step (1 = uniform scan)
    #[arg(long, default_value = "5")]
    coarse_factor: u32,

    /// Ranking key: peak_ratio or intensity
    #[arg(long, default_value = "peak_ratio")]
    rank_by: RankBy,

    /// Only analyse segments matching Event:start-end (repeatable)
    #[arg(long, num_args = 1..)]
    segments: Vec<SegmentSelector>,

    /// Worker threads (0 = all cores, 1 = sequential)
    #[arg(short, long, default_value = "0")]
    workers: usize,

    /// Disable the per-segment runner pre-filter
    #[arg(long)]
    no_prefilter: bool,

    /// Print a detailed block for every segment
    #[arg(short, long)]
    verbose: bool,

    /// Write the ranked summary to this file
    #[arg(long)]
    export_summary: Option<PathBuf>,

    /// Export as JSON instead of CSV
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DensityArgs {
    /// Pace CSV (event, runner_id, pace, distance)
    pace_csv: PathBuf,

    /// Event start time as Event=minutes_since_midnight (repeatable)
    #[arg(short = 's', long = "start-times", num_args = 1.., required = true)]
    start_times: Vec<String>,

    /// Segment as EventA,EventB,from,to,width_m,uni|bi; EventB may be empty (repeatable)
    #[arg(long = "segment", required = true)]
    segments: Vec<DensitySegment>,

    /// Step length in kilometers
    #[arg(long, default_value = "0.03")]
    step: f64,

    /// Full time window in seconds, centered on the first arrival
    #[arg(long, default_value = "60")]
    time_window: f64,

    /// Print rollups as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Overlap(args) => run_overlap(args),
        Commands::Density(args) => run_density(args),
    }
}

fn run_overlap(args: OverlapArgs) -> Result<()> {
    let started = Instant::now();

    let roster = load_roster(&args.pace_csv)?;
    let catalogue = read_segments(BufReader::new(open(&args.overlaps_csv)?))
        .with_context(|| format!("failed to load {}", args.overlaps_csv.display()))?;
    let start_times = parse_start_times(&args.start_times)?;

    log::info!(
        "Loaded {} runners in {} events, {} segments",
        roster.len(),
        roster.events().count(),
        catalogue.len()
    );

    let config = AnalysisConfig {
        time_window_seconds: args.time_window,
        step_km: args.step,
        coarse_factor: args.coarse_factor,
        prefilter: !args.no_prefilter,
        rank_by: args.rank_by,
        segments: args.segments,
        workers: args.workers,
    };

    let report = analyze(&roster, &start_times, &catalogue, &config)?;

    if args.verbose {
        for result in &report.results {
            println!("{}", "=".repeat(60));
            println!("{}", render_segment(result));
        }
        println!("{}", "=".repeat(60));
    }
    print!("{}", render_summary(&report));

    if let Some(path) = &args.export_summary {
        export(path, &report.summary_records(), args.json)?;
        println!("\nSummary written to {}", path.display());
    }

    log::info!(
        "Analysed {} segments in {:.2}s",
        report.len(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn run_density(args: DensityArgs) -> Result<()> {
    let started = Instant::now();

    let roster = load_roster(&args.pace_csv)?;
    let start_times = parse_start_times(&args.start_times)?;
    let config = DensityConfig {
        step_km: args.step,
        time_window_seconds: args.time_window,
        ..DensityConfig::default()
    };

    let rollups = analyze_density(&roster, &start_times, &args.segments, &config)?;

    if args.json {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        serde_json::to_writer_pretty(&mut out, &rollups).context("failed to write JSON")?;
        writeln!(out)?;
    } else {
        for rollup in &rollups {
            println!("{}", render_density_block(rollup));
        }
    }

    log::info!(
        "Rolled up {} density segments in {:.2}s",
        rollups.len(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn load_roster(path: &Path) -> Result<Roster> {
    read_roster(BufReader::new(open(path)?))
        .with_context(|| format!("failed to load {}", path.display()))
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("failed to open {}", path.display()))
}

fn export(path: &Path, records: &[SummaryRecord], json: bool) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    if json {
        serde_json::to_writer_pretty(&mut writer, records)
            .with_context(|| format!("failed to write {}", path.display()))?;
        writer.flush()?;
    } else {
        write_summary_csv(records, writer)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}
