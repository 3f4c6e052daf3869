//! Block Assembler - groups monitor key/value pairs into per-timestep records

use crate::store::{now_scraped_at, Document, JOB_ID_FIELD, SCRAPED_AT_FIELD, TIMESTEP_FIELD};
use crate::value::Value;

/// Result of feeding one key/value pair to the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    /// Pair added to the open block
    Accepted,
    /// A new timestep marker closed the previous block
    Completed(Document),
    /// Metric seen before any timestep marker; dropped
    Discarded,
    /// Timestep marker whose value is not an integer; dropped
    Malformed,
    /// Timestep marker repeating the open block's timestep; dropped
    Repeated,
}

/// An open block dropped without being emitted (file truncated or rotated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discontinuity {
    /// Timestep of the dropped block
    pub dropped_ts: i64,
    /// Number of fields the dropped block held, including `time_tsnumber`
    pub dropped_fields: usize,
}

/// Stateful grouping of a flat `KEY = VALUE` stream into one record per
/// `time_tsnumber`.
///
/// A block opens at each `time_tsnumber` marker and is completed when the
/// next marker with a different timestep arrives; a marker equal to the open
/// timestep is ignored. Repeated keys within a block become lists in
/// arrival order. The assembler does no I/O; completed records are returned
/// to the caller.
#[derive(Debug, Clone)]
pub struct BlockAssembler {
    job_id: Value,
    current_ts: Option<i64>,
    current: Document,
    discarded: u64,
}

impl BlockAssembler {
    /// Create an assembler stamping `job_id` on every record.
    #[must_use]
    pub fn new(job_id: impl Into<Value>) -> Self {
        Self {
            job_id: job_id.into(),
            current_ts: None,
            current: Document::new(),
            discarded: 0,
        }
    }

    /// Timestep of the open block, if any.
    #[must_use]
    pub const fn current_ts(&self) -> Option<i64> {
        self.current_ts
    }

    /// Metrics dropped because no block was open.
    #[must_use]
    pub const fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Feed one key/value pair.
    pub fn push(&mut self, key: &str, value: Value) -> Assembled {
        if key == TIMESTEP_FIELD {
            let Some(ts) = value.as_i64() else {
                return Assembled::Malformed;
            };
            if self.current_ts == Some(ts) {
                return Assembled::Repeated;
            }
            let completed = self.take_block();
            self.current_ts = Some(ts);
            self.current.insert(TIMESTEP_FIELD, value);
            return completed.map_or(Assembled::Accepted, Assembled::Completed);
        }

        if self.current_ts.is_none() {
            self.discarded += 1;
            return Assembled::Discarded;
        }

        match self.current.get_mut(key) {
            Some(existing) => existing.append(value),
            None => {
                self.current.insert(key, value);
            }
        }
        Assembled::Accepted
    }

    /// Complete and return the open block, leaving no block open.
    pub fn finish(&mut self) -> Option<Document> {
        let completed = self.take_block();
        self.current_ts = None;
        completed
    }

    /// Drop the open block without emitting it.
    ///
    /// Returns a [`Discontinuity`] describing what was lost, or `None` if no
    /// block was open.
    pub fn reset(&mut self) -> Option<Discontinuity> {
        let dropped = self.current_ts.take().map(|ts| Discontinuity {
            dropped_ts: ts,
            dropped_fields: self.current.len(),
        });
        self.current = Document::new();
        dropped
    }

    fn take_block(&mut self) -> Option<Document> {
        if self.current_ts.is_none() || self.current.is_empty() {
            return None;
        }
        let mut record = std::mem::take(&mut self.current);
        record.insert(JOB_ID_FIELD, self.job_id.clone());
        record.insert(SCRAPED_AT_FIELD, now_scraped_at());
        Some(record)
    }
}
