//! Log Tailer - follows a growing (and possibly truncated) log file
//!
//! The tailer is a synchronous polling loop. Its only suspension point is the
//! sleep between empty reads; cancellation is cooperative through
//! [`StopSignal`].

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::line::parse_monitor_line;
use super::{Assembled, BlockAssembler, RecordSink};
use crate::config::TailOptions;
use crate::store::Document;
use crate::value::coerce;
use crate::{Error, Result};

/// Longest uninterrupted sleep; bounds how late a stop request is noticed.
const STOP_CHECK_SLICE: Duration = Duration::from_millis(50);

/// Cloneable cancellation flag shared between the tailer and its owner.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create a signal in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this signal to stop.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Check whether stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, returning early if stop is requested.
    pub fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.is_stopped() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(STOP_CHECK_SLICE));
        }
    }
}

/// Diagnostic counters for one tailing session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailStats {
    /// Complete lines read
    pub lines_read: u64,
    /// Lines matching the monitor pattern
    pub lines_matched: u64,
    /// Lines ignored as log noise
    pub lines_skipped: u64,
    /// Metrics dropped because they arrived before any timestep marker
    pub metrics_discarded: u64,
    /// Timestep markers whose value was not an integer
    pub malformed_markers: u64,
    /// Timestep markers repeating the open block's timestep
    pub repeated_markers: u64,
    /// Records handed to the sink
    pub records_emitted: u64,
    /// Times the file shrank and reading restarted from the top
    pub truncations: u64,
    /// Open blocks lost to truncation
    pub discontinuities: u64,
}

/// Follows one log file and drives a [`BlockAssembler`].
#[derive(Debug)]
pub struct Tailer {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
    pending: Vec<u8>,
    options: TailOptions,
    stats: TailStats,
}

impl Tailer {
    /// Open `path` for tailing.
    ///
    /// Positions at the start of the file when `options.from_start` is set,
    /// otherwise at its current end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogNotFound`] if the file does not exist; the tailer
    /// does not wait for it to appear.
    pub fn open(path: impl Into<PathBuf>, options: TailOptions) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::LogNotFound(path.clone()),
            _ => Error::Io(e),
        })?;
        let mut reader = BufReader::new(file);
        let offset = if options.from_start {
            0
        } else {
            reader.seek(SeekFrom::End(0))?
        };
        Ok(Self {
            path,
            reader,
            offset,
            pending: Vec::new(),
            options,
            stats: TailStats::default(),
        })
    }

    /// Path being followed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes consumed so far, including a held-back partial line.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> &TailStats {
        &self.stats
    }

    /// Run until `stop` is signalled (or, without `follow`, until the end of
    /// the file), feeding every monitor line to `assembler` and every
    /// completed record to `sink`.
    ///
    /// On the way out the open block is emitted if `flush_on_shutdown` is
    /// set, and the sink is flushed.
    ///
    /// # Errors
    ///
    /// Returns error if reading the log fails or the sink rejects a record
    pub fn run<S: RecordSink + ?Sized>(
        &mut self,
        assembler: &mut BlockAssembler,
        sink: &mut S,
        stop: &StopSignal,
    ) -> Result<TailStats> {
        tracing::info!(
            path = %self.path.display(),
            offset = self.offset,
            follow = self.options.follow,
            "Tailing monitor log"
        );

        while !stop.is_stopped() {
            if let Some(line) = self.next_line()? {
                self.handle_line(&line, assembler, sink)?;
                continue;
            }
            self.check_truncation(assembler, sink)?;
            if !self.options.follow {
                break;
            }
            stop.sleep(self.options.poll_interval);
        }

        if self.options.flush_on_shutdown {
            if let Some(record) = assembler.finish() {
                self.emit(record, sink)?;
            }
        }
        sink.flush()?;

        tracing::info!(
            records = self.stats.records_emitted,
            lines = self.stats.lines_read,
            skipped = self.stats.lines_skipped,
            "Stopped tailing"
        );
        Ok(self.stats.clone())
    }

    /// Next complete line, or `None` if only a partial line (or nothing) is
    /// available yet. Invalid UTF-8 is replaced rather than rejected.
    fn next_line(&mut self) -> Result<Option<String>> {
        let n = self.reader.read_until(b'\n', &mut self.pending)?;
        self.offset += n as u64;
        if self.pending.last() != Some(&b'\n') {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Ok(Some(line))
    }

    fn handle_line<S: RecordSink + ?Sized>(
        &mut self,
        line: &str,
        assembler: &mut BlockAssembler,
        sink: &mut S,
    ) -> Result<()> {
        self.stats.lines_read += 1;
        let Some((key, raw)) = parse_monitor_line(line) else {
            self.stats.lines_skipped += 1;
            return Ok(());
        };
        self.stats.lines_matched += 1;

        match assembler.push(key, coerce(raw)) {
            Assembled::Accepted => {}
            Assembled::Completed(record) => self.emit(record, sink)?,
            Assembled::Discarded => self.stats.metrics_discarded += 1,
            Assembled::Malformed => {
                self.stats.malformed_markers += 1;
                tracing::warn!(value = raw, "Ignoring non-integer time_tsnumber");
            }
            Assembled::Repeated => {
                self.stats.repeated_markers += 1;
                tracing::debug!(value = raw, "Ignoring repeated time_tsnumber");
            }
        }
        Ok(())
    }

    fn emit<S: RecordSink + ?Sized>(&mut self, mut record: Document, sink: &mut S) -> Result<()> {
        sink.accept(&mut record)?;
        self.stats.records_emitted += 1;
        tracing::debug!(time_tsnumber = ?record.timestep(), fields = record.len(), "Emitted record");
        Ok(())
    }

    /// Restart from the top if the file is now shorter than what was read.
    fn check_truncation<S: RecordSink + ?Sized>(
        &mut self,
        assembler: &mut BlockAssembler,
        sink: &mut S,
    ) -> Result<()> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Log file missing; waiting");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Cannot stat log file");
                return Ok(());
            }
        };
        if size >= self.offset {
            return Ok(());
        }

        tracing::warn!(
            path = %self.path.display(),
            size,
            offset = self.offset,
            "Log file truncated or rotated; restarting from the beginning"
        );
        self.reader.seek(SeekFrom::Start(0))?;
        self.offset = 0;
        self.pending.clear();
        self.stats.truncations += 1;

        if let Some(marker) = assembler.reset() {
            tracing::warn!(
                dropped_ts = marker.dropped_ts,
                dropped_fields = marker.dropped_fields,
                "Dropped open block at truncation"
            );
            self.stats.discontinuities += 1;
            sink.discontinuity(&marker)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::io::Write;

    fn once() -> TailOptions {
        TailOptions::new().from_start(true).follow(false).echo_stdout(false)
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = Tailer::open("/definitely/not/here/STDOUT.0000", once()).unwrap_err();
        assert!(matches!(err, Error::LogNotFound(_)));
    }

    #[test]
    fn test_partial_line_held_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("STDOUT.0000");
        fs::write(&path, "%MON time_tsnumber = 1\n%MON x = 1").unwrap();

        let mut tailer = Tailer::open(&path, once()).unwrap();
        assert_eq!(tailer.next_line().unwrap().as_deref(), Some("%MON time_tsnumber = 1\n"));
        assert_eq!(tailer.next_line().unwrap(), None);

        let mut f = fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"23\n").unwrap();
        assert_eq!(tailer.next_line().unwrap().as_deref(), Some("%MON x = 123\n"));
        assert_eq!(tailer.offset(), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_invalid_utf8_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("STDOUT.0000");
        fs::write(&path, b"\xff\xfe junk\n%MON time_tsnumber = 1\n%MON x = 2\n").unwrap();

        let mut asm = BlockAssembler::new(0);
        let mut out: Vec<Document> = Vec::new();
        let stats = Tailer::open(&path, once())
            .unwrap()
            .run(&mut asm, &mut out, &StopSignal::new())
            .unwrap();

        assert_eq!(stats.lines_read, 3);
        assert_eq!(stats.lines_skipped, 1);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_repeated_marker_counted_not_emitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("STDOUT.0000");
        fs::write(
            &path,
            "%MON time_tsnumber = 1\n%MON x = 2\n%MON time_tsnumber = 1\n%MON x = 3\n",
        )
        .unwrap();

        let mut asm = BlockAssembler::new(0);
        let mut out: Vec<Document> = Vec::new();
        let stats = Tailer::open(&path, once())
            .unwrap()
            .run(&mut asm, &mut out, &StopSignal::new())
            .unwrap();

        assert_eq!(stats.repeated_markers, 1);
        assert_eq!(stats.records_emitted, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].get("x"),
            Some(&Value::List(vec![Value::Int(2), Value::Int(3)]))
        );
    }

    #[test]
    fn test_no_flush_on_shutdown_keeps_block_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("STDOUT.0000");
        fs::write(&path, "%MON time_tsnumber = 1\n%MON x = 2\n").unwrap();

        let mut asm = BlockAssembler::new(0);
        let mut out: Vec<Document> = Vec::new();
        Tailer::open(&path, once().flush_on_shutdown(false))
            .unwrap()
            .run(&mut asm, &mut out, &StopSignal::new())
            .unwrap();

        assert!(out.is_empty());
        assert_eq!(asm.current_ts(), Some(1));
    }

    #[test]
    fn test_tail_from_end_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("STDOUT.0000");
        fs::write(&path, "%MON time_tsnumber = 1\n%MON x = 2\n").unwrap();

        let tailer = Tailer::open(&path, once().from_start(false)).unwrap();
        assert_eq!(tailer.offset(), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_truncation_resets_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("STDOUT.0000");
        fs::write(&path, "%MON time_tsnumber = 1\n%MON x = 2\n").unwrap();

        let mut tailer = Tailer::open(&path, once().flush_on_shutdown(false)).unwrap();
        let mut asm = BlockAssembler::new(0);
        let mut out: Vec<Document> = Vec::new();
        tailer.run(&mut asm, &mut out, &StopSignal::new()).unwrap();
        assert_eq!(asm.current_ts(), Some(1));

        fs::write(&path, "%MON x = 9\n").unwrap();
        tailer.check_truncation(&mut asm, &mut out).unwrap();

        assert_eq!(tailer.offset(), 0);
        assert_eq!(tailer.stats().truncations, 1);
        assert_eq!(tailer.stats().discontinuities, 1);
        assert_eq!(asm.current_ts(), None);
    }

    #[test]
    fn test_stop_signal_interrupts_sleep() {
        let stop = StopSignal::new();
        stop.stop();
        let start = Instant::now();
        stop.sleep(Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
