//! Monitor and tailer configuration
//!
//! Everything the pipeline needs is passed explicitly through these structs.
//! [`MonitorConfig::from_env`] reads the conventional environment variables
//! once; library code never consults the environment on its own.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::store::{Collection, Store};
use crate::value::{coerce, Value};
use crate::Result;

/// Environment variable naming the store root directory.
pub const ENV_DBROOT: &str = "MON_DBROOT";
/// Environment variable naming the database (ensemble).
pub const ENV_ENSEMBLE_NAME: &str = "ENSEMBLE_NAME";
/// Environment variable holding the job identifier.
pub const ENV_JOB_ID: &str = "JOBID";
/// Environment variable naming the collection (ensemble member).
pub const ENV_MEMBER_ID: &str = "MEMBERID";

/// Default store root.
pub const DEFAULT_DBROOT: &str = "monitoring";
/// Default database name.
pub const DEFAULT_ENSEMBLE_NAME: &str = "test";
/// Default job identifier, used when the job scheduler provides none.
pub const DEFAULT_JOB_ID: &str = "-1";
/// Default collection name.
pub const DEFAULT_MEMBER_ID: &str = "memb000";
/// Default delay between polls of an idle log file.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Where records go: store root, database, collection, and the job id
/// stamped on each record.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    dbroot: PathBuf,
    ensemble_name: String,
    job_id: Value,
    member_id: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            dbroot: PathBuf::from(DEFAULT_DBROOT),
            ensemble_name: DEFAULT_ENSEMBLE_NAME.to_string(),
            job_id: coerce(DEFAULT_JOB_ID),
            member_id: DEFAULT_MEMBER_ID.to_string(),
        }
    }
}

impl MonitorConfig {
    /// Configuration with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `MON_DBROOT`, `ENSEMBLE_NAME`, `JOBID` and `MEMBERID` from the
    /// process environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// The job id is coerced like a metric value, so `JOBID=4711` is stored
    /// as the integer 4711.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(root) = lookup(ENV_DBROOT) {
            config.dbroot = PathBuf::from(root);
        }
        if let Some(name) = lookup(ENV_ENSEMBLE_NAME) {
            config.ensemble_name = name;
        }
        if let Some(job) = lookup(ENV_JOB_ID) {
            config.job_id = coerce(&job);
        }
        if let Some(member) = lookup(ENV_MEMBER_ID) {
            config.member_id = member;
        }
        config
    }

    /// Set the store root.
    #[must_use]
    pub fn dbroot_path(mut self, root: impl Into<PathBuf>) -> Self {
        self.dbroot = root.into();
        self
    }

    /// Set the database (ensemble) name.
    #[must_use]
    pub fn ensemble(mut self, name: impl Into<String>) -> Self {
        self.ensemble_name = name.into();
        self
    }

    /// Set the job identifier.
    #[must_use]
    pub fn job(mut self, job_id: impl Into<Value>) -> Self {
        self.job_id = job_id.into();
        self
    }

    /// Set the collection (member) name.
    #[must_use]
    pub fn member(mut self, name: impl Into<String>) -> Self {
        self.member_id = name.into();
        self
    }

    /// Store root directory.
    #[must_use]
    pub fn dbroot(&self) -> &Path {
        &self.dbroot
    }

    /// Database (ensemble) name.
    #[must_use]
    pub fn ensemble_name(&self) -> &str {
        &self.ensemble_name
    }

    /// Job identifier stamped on every record.
    #[must_use]
    pub const fn job_id(&self) -> &Value {
        &self.job_id
    }

    /// Collection (member) name.
    #[must_use]
    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// Open the collection this configuration points at.
    ///
    /// # Errors
    ///
    /// Returns error if a directory cannot be created or a name is invalid
    pub fn open_collection(&self) -> Result<Collection> {
        Store::from_config(self)?
            .database(&self.ensemble_name)?
            .collection(&self.member_id)
    }
}

/// How the tailer reads its log file and where it echoes records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailOptions {
    /// Parse from the beginning instead of the current end of file
    pub from_start: bool,
    /// Delay between polls when no complete line is available
    pub poll_interval: Duration,
    /// Append newline-delimited JSON records to this file
    pub output: Option<PathBuf>,
    /// Echo newline-delimited JSON records to stdout
    pub echo_stdout: bool,
    /// Keep polling for new lines; when false, stop at the current end of file
    pub follow: bool,
    /// Emit the open block when the tailer stops cleanly
    pub flush_on_shutdown: bool,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            from_start: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            output: None,
            echo_stdout: true,
            follow: true,
            flush_on_shutdown: true,
        }
    }
}

impl TailOptions {
    /// Options with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from the beginning of the file.
    #[must_use]
    pub const fn from_start(mut self, from_start: bool) -> Self {
        self.from_start = from_start;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Append records to an NDJSON file.
    #[must_use]
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Echo records to stdout.
    #[must_use]
    pub const fn echo_stdout(mut self, echo: bool) -> Self {
        self.echo_stdout = echo;
        self
    }

    /// Keep following the file after reaching its end.
    #[must_use]
    pub const fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// Emit the in-flight block on clean shutdown.
    #[must_use]
    pub const fn flush_on_shutdown(mut self, flush: bool) -> Self {
        self.flush_on_shutdown = flush;
        self
    }
}
