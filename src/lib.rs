//! # spectre-monitor: MITgcm Run Monitoring Pipeline
//!
//! Follows a simulation's live `STDOUT` log, rebuilds one structured record
//! per model timestep from the unstructured `%MON` statistics lines, and
//! persists each record in a filesystem-backed document store that
//! dashboards can read while ingestion is running.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Muda elimination**: one JSON file per record, no index to maintain
//! - **Poka-Yoke safety**: atomic temp-file + rename writes; readers never
//!   see a half-written record
//! - **Genchi Genbutsu**: documents are plain JSON, inspectable with `cat`
//! - **Jidoka**: noisy log lines and corrupt documents are skipped and
//!   counted, never allowed to stop ingestion
//!
//! ## Example Usage
//!
//! ```rust
//! use spectre_monitor::monitor::{Assembled, BlockAssembler};
//! use spectre_monitor::value::coerce;
//!
//! let mut assembler = BlockAssembler::new(4711);
//! assembler.push("time_tsnumber", coerce("1"));
//! assembler.push("dynstat_eta_max", coerce("1.23D-01"));
//!
//! // The next timestep marker completes the previous record.
//! let Assembled::Completed(record) = assembler.push("time_tsnumber", coerce("2")) else {
//!     unreachable!()
//! };
//! assert_eq!(record.timestep(), Some(1));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod monitor;
pub mod store;
pub mod value;

pub use error::{Error, Result};
