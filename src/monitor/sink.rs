//! Record sinks - where completed records go

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::Discontinuity;
use crate::store::{Collection, Document};
use crate::Result;

/// Destination for completed records.
pub trait RecordSink {
    /// Consume one completed record.
    ///
    /// A sink may add fields to the record; sinks later in a [`FanOut`] see
    /// them. The store sink sets `_id` this way.
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be written
    fn accept(&mut self, record: &mut Document) -> Result<()>;

    /// Observe an open block dropped by a truncation reset.
    ///
    /// # Errors
    ///
    /// Returns error if the sink fails to record the marker
    fn discontinuity(&mut self, _marker: &Discontinuity) -> Result<()> {
        Ok(())
    }

    /// Flush buffered output.
    ///
    /// # Errors
    ///
    /// Returns error if buffered output cannot be written
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RecordSink for Collection {
    fn accept(&mut self, record: &mut Document) -> Result<()> {
        self.insert(record)?;
        Ok(())
    }
}

/// Newline-delimited JSON output to stdout and/or an append-mode file.
///
/// Every line is flushed as soon as it is written so a downstream reader
/// following the output sees whole records.
pub struct JsonLinesSink {
    stdout: Option<io::Stdout>,
    file: Option<BufWriter<File>>,
    written: u64,
}

impl JsonLinesSink {
    /// Create a sink; with neither stdout nor a file it discards output.
    ///
    /// # Errors
    ///
    /// Returns error if the output file cannot be opened for appending
    pub fn new(echo_stdout: bool, path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => Some(BufWriter::new(
                OpenOptions::new().create(true).append(true).open(path)?,
            )),
            None => None,
        };
        Ok(Self {
            stdout: echo_stdout.then(io::stdout),
            file,
            written: 0,
        })
    }

    /// Number of lines written.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }
}

impl RecordSink for JsonLinesSink {
    fn accept(&mut self, record: &mut Document) -> Result<()> {
        let mut line = serde_json::to_vec(&*record)?;
        line.push(b'\n');
        if let Some(stdout) = &self.stdout {
            let mut out = stdout.lock();
            out.write_all(&line)?;
            out.flush()?;
        }
        if let Some(file) = &mut self.file {
            file.write_all(&line)?;
            file.flush()?;
        }
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(file) = &mut self.file {
            file.flush()?;
        }
        Ok(())
    }
}

/// Forwards each record to every inner sink, in order.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn RecordSink + Send>>,
}

impl FanOut {
    /// Create an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sink.
    #[must_use]
    pub fn with(mut self, sink: impl RecordSink + Send + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of inner sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Check if there are no inner sinks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl RecordSink for FanOut {
    fn accept(&mut self, record: &mut Document) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.accept(record))
    }

    fn discontinuity(&mut self, marker: &Discontinuity) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.discontinuity(marker))
    }

    fn flush(&mut self) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.flush())
    }
}

impl RecordSink for Vec<Document> {
    fn accept(&mut self, record: &mut Document) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}
