//! hitreduce command-line interface.
//!
//! Reduces JSON-lines event files with a configurable stage sequence.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand};

use hitreduce_algorithms::{
    reduce_events, reduce_events_sequential, PipelineBuilder, DEFAULT_CHUNK_SIZE,
};
use hitreduce_core::{GeometryOracle, GeometryTable, RawEvent, ReducerConfig};
use hitreduce_io::{EventFileReader, EventFileWriter, SummaryRecord, SummaryWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    HitreduceIo(#[from] hitreduce_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] hitreduce_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Hit-level event reduction for drift-chamber tracking.
#[derive(Parser)]
#[command(name = "hitreduce")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reduce the hits of every event in a file
    Reduce {
        /// Input event file (JSON lines)
        input: PathBuf,

        /// Output event file
        #[arg(short, long)]
        output: PathBuf,

        /// Geometry file (JSON); the nominal layout is used if omitted
        #[arg(short, long)]
        geometry: Option<PathBuf>,

        /// Stage letters, e.g. "aocs"
        #[arg(long, default_value = "aoc")]
        options: String,

        /// Seed of the realization random stream
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Per-event summary CSV
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Reduce event chunks on all cores
        #[arg(long)]
        parallel: bool,

        /// Events per parallel chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Show information about an event file
    Info {
        /// Input event file
        input: PathBuf,
    },

    /// Benchmark the reduction of an event file
    Benchmark {
        /// Input event file
        input: PathBuf,

        /// Geometry file (JSON)
        #[arg(short, long)]
        geometry: Option<PathBuf>,

        /// Stage letters
        #[arg(long, default_value = "aocs")]
        options: String,

        /// Number of iterations
        #[arg(short, long, default_value = "3")]
        iterations: usize,
    },
}

fn load_geometry(path: Option<&Path>) -> Result<Arc<dyn GeometryOracle>> {
    let table = match path {
        Some(path) => {
            log::info!("loading geometry from {}", path.display());
            GeometryTable::from_file(path)?
        }
        None => {
            log::info!("using nominal geometry");
            GeometryTable::nominal()
        }
    };
    Ok(Arc::new(table))
}

fn parse_options(options: &str, seed: u64) -> Result<ReducerConfig> {
    let config = ReducerConfig::from_options(options).with_seed(seed);
    if config.trigger_mask {
        return Err(CliError::Config(
            "trigger road masking ('t') needs a trigger analyzer, which the CLI does not provide"
                .into(),
        ));
    }
    Ok(config)
}

/// Reduces `events` chunk by chunk; both modes seed chunk `i` with `seed + i`.
fn run_reduction(
    events: &mut [RawEvent],
    builder: &PipelineBuilder,
    chunk_size: usize,
    parallel: bool,
) -> Result<usize> {
    let removed = if parallel {
        reduce_events(events, builder, chunk_size)?
    } else {
        reduce_events_sequential(events, builder, chunk_size)?
    };
    Ok(removed)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Reduce {
            input,
            output,
            geometry,
            options,
            seed,
            summary,
            parallel,
            chunk_size,
        } => {
            let config = parse_options(&options, seed)?;
            let geometry = load_geometry(geometry.as_deref())?;
            let builder = PipelineBuilder::new(config, geometry);

            let reader = EventFileReader::open(&input)?;
            let mut events = reader.read_all()?;
            log::info!("read {} events from {}", events.len(), input.display());

            let before: Vec<(usize, usize)> = events
                .iter()
                .map(|e| (e.hits.len(), e.chamber_hit_count()))
                .collect();

            let start = Instant::now();
            let removed = run_reduction(&mut events, &builder, chunk_size, parallel)?;
            let elapsed = start.elapsed();

            let mut writer = EventFileWriter::create(&output)?;
            writer.write_events(&events)?;
            writer.flush()?;

            if let Some(path) = summary {
                let mut summary = SummaryWriter::create(&path)?;
                for (event, (hits_before, chamber_before)) in events.iter().zip(before) {
                    summary.write_record(&SummaryRecord {
                        run: event.run_id,
                        spill: event.spill_id,
                        event: event.event_id,
                        hits_before,
                        hits_after: event.hits.len(),
                        removed: chamber_before.saturating_sub(event.chamber_hit_count()),
                    })?;
                }
                summary.flush()?;
                log::info!("summary written to {}", path.display());
            }

            println!(
                "Reduced {} events in {:.2}s",
                events.len(),
                elapsed.as_secs_f64()
            );
            println!("Chamber hits removed: {}", removed);
            println!("Output: {}", output.display());
        }

        Commands::Info { input } => {
            let reader = EventFileReader::open(&input)?;
            let file_size = reader.file_size();
            let events = reader.read_all()?;

            println!("File: {}", input.display());
            println!(
                "Size: {} bytes ({:.2} MB)",
                file_size,
                file_size as f64 / 1_000_000.0
            );
            println!("Events: {}", events.len());

            let chamber: usize = events.iter().map(RawEvent::chamber_hit_count).sum();
            let hodo: usize = events.iter().map(RawEvent::hodo_hit_count).sum();
            let prop: usize = events.iter().map(RawEvent::prop_hit_count).sum();
            let trigger: usize = events.iter().map(|e| e.trigger_hits.len()).sum();
            let nim_only = events.iter().filter(|e| e.is_nim_only()).count();

            println!("Chamber hits: {}", chamber);
            println!("Hodoscope hits: {}", hodo);
            println!("Prop tube hits: {}", prop);
            println!("Trigger hits: {}", trigger);
            println!("NIM-only events: {}", nim_only);

            if !events.is_empty() {
                let total = chamber + hodo + prop;
                println!(
                    "Mean hits per event: {:.1}",
                    total as f64 / events.len() as f64
                );
            }
        }

        Commands::Benchmark {
            input,
            geometry,
            options,
            iterations,
        } => {
            let config = parse_options(&options, 0)?;
            let geometry = load_geometry(geometry.as_deref())?;
            let builder = PipelineBuilder::new(config, geometry).share_mask_table();
            // Announce the stages once, not on every timed run.
            let _ = builder.clone().build()?;
            let builder = builder.quiet();
            let base_events = EventFileReader::open(&input)?.read_all()?;
            let total_hits: usize = base_events.iter().map(|e| e.hits.len()).sum();

            println!(
                "Benchmarking {} events ({} hits), {} iterations, options \"{}\"",
                base_events.len(),
                total_hits,
                iterations,
                config.to_options()
            );
            println!(
                "{:<10} | {:<15} | {:<15} | {:<15}",
                "Mode", "Mean Time (ms)", "Min Time (ms)", "Max Time (ms)"
            );
            println!("{:-<65}", "");

            for parallel in [false, true] {
                let mut times = Vec::with_capacity(iterations);

                // Warmup
                {
                    let mut events = base_events.clone();
                    run_reduction(&mut events, &builder, DEFAULT_CHUNK_SIZE, parallel)?;
                }

                for _ in 0..iterations {
                    let mut events = base_events.clone();
                    let start = Instant::now();
                    run_reduction(&mut events, &builder, DEFAULT_CHUNK_SIZE, parallel)?;
                    times.push(start.elapsed().as_secs_f64() * 1000.0);
                }

                if times.is_empty() {
                    continue;
                }
                let min_time = times.iter().fold(f64::INFINITY, |a, &b| a.min(b));
                let max_time = times.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                let mean_time = times.iter().sum::<f64>() / times.len() as f64;

                println!(
                    "{:<10} | {:<15.2} | {:<15.2} | {:<15.2}",
                    if parallel { "parallel" } else { "sequential" },
                    mean_time,
                    min_time,
                    max_time
                );
            }
        }
    }

    Ok(())
}
