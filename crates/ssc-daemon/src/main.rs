//! PWM-SSC daemon entry point.
//!
//! Builds the clock/sync/stamp synchronizer on the PWM controller, aligns the
//! channels, and keeps the capture record live until asked to stop.

mod capture_source;
mod control;
mod signals;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ssc_common::{DaemonConfig, SignalRole, SscConfig, SscResult, SystemClock};
use ssc_pwm::{PwmHal, SimulatedPwm, Synchronizer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::capture_source::CaptureSource;
use crate::signals::SignalHandler;

/// Main loop poll interval.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// PWM-SSC daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "pwm-sscd",
    about = "PWM-generated clock, frame sync and capture stamp for an SSC peripheral",
    version,
    long_about = None
)]
struct Args {
    /// Path to a configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the signals and record captures (default).
    Run(RunArgs),
    /// Validate the configuration and print the channel table.
    Check {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML.
    DumpConfig,
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Stop after this many captures (0 = run until signalled).
    #[arg(long, default_value = "0")]
    max_captures: u64,

    /// Write the final 16-byte capture record to this file on shutdown.
    #[arg(long, value_name = "FILE")]
    record_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    let config = load_config(&args)?;

    match args.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(run) => {
            info!(version = env!("CARGO_PKG_VERSION"), "Starting PWM-SSC daemon");
            config.validate().context("Invalid configuration")?;
            run_daemon(&config, &run)
        }
        Command::Check { json } => {
            config.validate().context("Invalid configuration")?;
            print!("{}", describe_config(&config, json)?);
            Ok(())
        }
        Command::DumpConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!("pwm_sscd={level},ssc_pwm={level},ssc_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `PWM_SSC_CONFIG` environment variable
/// 3. `/etc/pwm-ssc/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<SscConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return SscConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    if let Ok(env_path) = std::env::var("PWM_SSC_CONFIG") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from PWM_SSC_CONFIG");
            return SscConfig::from_file(&config_path)
                .with_context(|| format!("Failed to load config from PWM_SSC_CONFIG={env_path:?}"));
        }
        warn!(
            path = %env_path,
            "PWM_SSC_CONFIG set but file does not exist, checking other locations"
        );
    }

    for path in ["/etc/pwm-ssc/config.toml", "config/default.toml"] {
        let config_path = PathBuf::from(path);
        if config_path.exists() {
            info!(?config_path, "Loading config file");
            return SscConfig::from_file(&config_path)
                .with_context(|| format!("Failed to load config from {config_path:?}"));
        }
    }

    info!("No config file found, using built-in defaults");
    Ok(SscConfig::default())
}

/// Render the channel table for `check`.
fn describe_config(config: &SscConfig, json: bool) -> Result<String> {
    let signals = &config.signals;
    let frequency_hz = signals.clock.frequency_hz();

    if json {
        let value = serde_json::json!({
            "signals": signals,
            "frequency_hz": frequency_hz,
        });
        return Ok(serde_json::to_string_pretty(&value)? + "\n");
    }

    let mut out = format!(
        "{:<6} {:>7} {:>10} {:>10} {:<8}\n",
        "role", "channel", "period_ns", "duty_ns", "polarity"
    );
    for role in SignalRole::ALL {
        let ch = signals.get(role);
        out.push_str(&format!(
            "{:<6} {:>7} {:>10} {:>10} {:<8}\n",
            role.to_string(),
            ch.channel,
            ch.period_ns,
            ch.duty_ns,
            ch.polarity.to_string()
        ));
    }
    out.push_str(&format!("frequency: {frequency_hz} Hz\n"));
    Ok(out)
}

/// Call `enable()` until it succeeds, retrying failed alignment pulses up to
/// `daemon.enable_retries` times.
fn enable_with_retry<H: PwmHal>(sync: &mut Synchronizer<H>, daemon: &DaemonConfig) -> SscResult<()> {
    let mut attempt = 0;
    loop {
        match sync.enable() {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < daemon.enable_retries => {
                attempt += 1;
                warn!(
                    attempt,
                    max_retries = daemon.enable_retries,
                    error = %e,
                    "Alignment pulse failed, retrying"
                );
                std::thread::sleep(daemon.retry_delay);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Main daemon run loop.
fn run_daemon(config: &SscConfig, run: &RunArgs) -> Result<()> {
    let signal_handler = SignalHandler::new().context("Failed to set up signal handlers")?;

    let pwm = SimulatedPwm::from_config(&config.simulation);
    info!(
        channels = config.simulation.channel_count,
        "Using simulated PWM controller"
    );

    let clock = SystemClock::new().context("CLOCK_MONOTONIC unavailable")?;
    let mut sync = Synchronizer::build(pwm.clone(), &config.signals, Arc::new(clock))
        .context("Failed to acquire PWM channels")?;

    enable_with_retry(&mut sync, &config.daemon).context("Failed to synchronize PWM channels")?;
    info!(
        frequency = control::show_frequency(&sync).trim_end(),
        "PWM channels enabled"
    );

    let stamp = config.signals.stamp;
    let mut source = CaptureSource::start(
        pwm,
        stamp.channel,
        Duration::from_nanos(u64::from(stamp.period_ns)),
    )
    .context("Failed to start capture source")?;

    let recorder = sync.recorder();
    let mut last_status = Instant::now();

    while !signal_handler.shutdown_requested() {
        if signal_handler.take_resync_request() {
            match control::store_enable(&mut sync, "1") {
                Ok(_) => info!("PWM channels resynchronized"),
                Err(e) => warn!(error = %e, "Resync failed"),
            }
        }

        let record = recorder.snapshot();
        if run.max_captures > 0 && record.sequence_id >= run.max_captures {
            info!(captures = record.sequence_id, "Maximum capture count reached");
            signal_handler.request_shutdown();
            continue;
        }

        if last_status.elapsed() >= config.daemon.status_interval {
            info!(
                captures = record.sequence_id,
                last_timestamp_ns = record.timestamp,
                enables = sync.enable_count(),
                missed_edges = source.missed(),
                edge_period_us = source.period().as_micros(),
                "Periodic status"
            );
            last_status = Instant::now();
        }

        std::thread::sleep(POLL_INTERVAL);
    }

    info!("Shutting down...");
    source.stop();
    let blob = control::show_record(&recorder);
    sync.release();

    if let Some(path) = &run.record_out {
        std::fs::write(path, blob)
            .with_context(|| format!("Failed to write capture record to {path:?}"))?;
        info!(?path, "Capture record written");
    }

    let record = recorder.snapshot();
    info!(
        captures = record.sequence_id,
        last_timestamp_ns = record.timestamp,
        edges = source.edges(),
        signals = signal_handler.state().signal_count(),
        "Daemon shutdown complete"
    );

    Ok(())
}
