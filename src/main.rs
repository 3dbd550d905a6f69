//! Console front end: reads integers from stdin, runs them through the
//! reference pipeline and prints what comes out.
//!
//! Usage: int-pipeline [--capacity N] [--flush-interval SECS]

use clap::Parser;
use int_pipeline::{sink, source, CancellationToken, Pipeline, PipelineConfig, SystemClock};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "int-pipeline")]
#[command(version, about = "Filter integers from stdin and re-emit them in timed batches", long_about = None)]
struct Cli {
    /// Values retained by the buffer stage between flushes
    #[arg(short, long, default_value_t = int_pipeline::DEFAULT_WINDOW_CAPACITY)]
    capacity: usize,

    /// Seconds between buffer flushes
    #[arg(short, long, value_name = "SECS", default_value_t = int_pipeline::DEFAULT_FLUSH_INTERVAL.as_secs())]
    flush_interval: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        error!(error = %e, "pipeline failed");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> int_pipeline::Result<()> {
    let config = PipelineConfig::new(cli.capacity, Duration::from_secs(cli.flush_interval));
    info!(
        capacity = config.window_capacity,
        flush_interval_secs = cli.flush_interval,
        "starting pipeline"
    );

    let cancel = CancellationToken::new();
    let pipeline = Pipeline::from_config(&config, Arc::new(SystemClock), cancel.clone())?;

    let (values, reader) = source::spawn_line_source(
        io::BufReader::new(io::stdin()),
        io::stdout(),
        cancel.clone(),
    )?;
    let running = pipeline.run(values)?;

    let printed = sink::consume(&cancel, &running.output(), io::stdout())?;
    info!(printed, "input finished");

    let summary = running.metrics_summary();
    running.shutdown()?;
    if reader.join().is_err() {
        error!("source thread panicked");
    }
    info!("{}", summary.trim_end());
    Ok(())
}
