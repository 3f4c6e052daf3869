//! Tail an MITgcm STDOUT file and capture `%MON` statistics grouped by
//! `time_tsnumber`, storing one document per timestep and echoing each as
//! newline-delimited JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use spectre_monitor::config::{
    MonitorConfig, TailOptions, DEFAULT_DBROOT, DEFAULT_ENSEMBLE_NAME, DEFAULT_JOB_ID,
    DEFAULT_MEMBER_ID, ENV_DBROOT, ENV_ENSEMBLE_NAME, ENV_JOB_ID, ENV_MEMBER_ID,
};
use spectre_monitor::monitor::{tail_file, StopSignal, TailStats};
use spectre_monitor::value::coerce;
use spectre_monitor::Error;
use tracing_subscriber::EnvFilter;

/// mon-tail - follow an MITgcm log into the monitoring store
#[derive(Parser, Debug)]
#[command(name = "mon-tail")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to MITgcm STDOUT file to tail
    path: PathBuf,

    /// Parse the file from the beginning instead of tailing from the end
    #[arg(long)]
    from_start: bool,

    /// Optional path to append newline-delimited JSON to
    #[arg(long)]
    out: Option<PathBuf>,

    /// Polling interval in seconds
    #[arg(long, default_value = "0.25", value_parser = parse_interval)]
    poll_interval: Duration,

    /// Read to the current end of file, then exit
    #[arg(long)]
    once: bool,

    /// Do not echo records to stdout
    #[arg(long, short)]
    quiet: bool,

    /// Drop the in-flight block on shutdown instead of storing it
    #[arg(long)]
    no_flush: bool,

    /// Store root directory
    #[arg(long, env = ENV_DBROOT, default_value = DEFAULT_DBROOT)]
    dbroot: PathBuf,

    /// Database (ensemble) name
    #[arg(long, env = ENV_ENSEMBLE_NAME, default_value = DEFAULT_ENSEMBLE_NAME)]
    ensemble: String,

    /// Job identifier stamped into every record
    #[arg(long, env = ENV_JOB_ID, default_value = DEFAULT_JOB_ID, allow_hyphen_values = true)]
    job_id: String,

    /// Collection (ensemble member) name
    #[arg(long, env = ENV_MEMBER_ID, default_value = DEFAULT_MEMBER_ID)]
    member: String,
}

fn parse_interval(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{e}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            match e.downcast_ref::<Error>() {
                Some(Error::LogNotFound(_)) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(args: Args) -> anyhow::Result<TailStats> {
    let config = MonitorConfig::new()
        .dbroot_path(args.dbroot)
        .ensemble(args.ensemble)
        .job(coerce(&args.job_id))
        .member(args.member);

    let mut options = TailOptions::new()
        .from_start(args.from_start)
        .poll_interval(args.poll_interval)
        .echo_stdout(!args.quiet)
        .follow(!args.once)
        .flush_on_shutdown(!args.no_flush);
    if let Some(out) = args.out {
        options = options.output(out);
    }

    let stop = StopSignal::new();
    let on_signal = stop.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown requested");
        on_signal.stop();
    });

    let path = args.path;
    let stats = tokio::task::spawn_blocking(move || tail_file(path, &config, &options, &stop))
        .await
        .context("tailer task failed")??;

    tracing::info!(?stats, "Done");
    Ok(stats)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!(error = %e, "Cannot listen for SIGTERM"),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
