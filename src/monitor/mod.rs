//! Run monitoring: `%MON` log lines → per-timestep records → store
//!
//! ## Pipeline
//!
//! ```text
//! STDOUT.0000 ──> Tailer ──(key, Value)──> BlockAssembler ──Document──> RecordSink
//!                                                                         ├─ Collection (store)
//!                                                                         └─ JsonLinesSink (NDJSON)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use spectre_monitor::config::{MonitorConfig, TailOptions};
//! use spectre_monitor::monitor::{tail_file, StopSignal};
//!
//! # fn example() -> spectre_monitor::Result<()> {
//! let config = MonitorConfig::from_env();
//! let options = TailOptions::new().from_start(true);
//! let stop = StopSignal::new();
//!
//! // Blocks until `stop.stop()` is called from another thread.
//! let stats = tail_file("run/STDOUT.0000", &config, &options, &stop)?;
//! println!("{} records", stats.records_emitted);
//! # Ok(())
//! # }
//! ```

mod assembler;
mod line;
mod sink;
mod tailer;

pub use assembler::{Assembled, BlockAssembler, Discontinuity};
pub use line::parse_monitor_line;
pub use sink::{FanOut, JsonLinesSink, RecordSink};
pub use tailer::{StopSignal, TailStats, Tailer};

use std::path::PathBuf;

use crate::config::{MonitorConfig, TailOptions};
use crate::Result;

/// Tail `path` into the collection named by `config`, echoing NDJSON as
/// `options` asks.
///
/// Records are inserted into the store before they are written to any
/// NDJSON output.
///
/// # Errors
///
/// Returns [`crate::Error::LogNotFound`] if `path` does not exist, or any
/// store or output error raised while running
pub fn tail_file(
    path: impl Into<PathBuf>,
    config: &MonitorConfig,
    options: &TailOptions,
    stop: &StopSignal,
) -> Result<TailStats> {
    let mut tailer = Tailer::open(path, options.clone())?;
    let collection = config.open_collection()?;
    tracing::info!(
        collection = %collection.path().display(),
        job_id = %config.job_id(),
        "Writing records"
    );

    let json = JsonLinesSink::new(options.echo_stdout, options.output.as_deref())?;
    let mut sink = FanOut::new().with(collection).with(json);
    let mut assembler = BlockAssembler::new(config.job_id().clone());

    tailer.run(&mut assembler, &mut sink, stop)
}
