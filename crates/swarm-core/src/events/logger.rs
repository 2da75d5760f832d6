//! Event Log
//!
//! Append-only sink for per-tick records. Either retains records in memory
//! or writes them as JSONL (one JSON object per line).

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use swarm_events::{RunSummary, TickRecord};

use crate::error::SimError;

enum Sink {
    Memory(Vec<TickRecord>),
    Jsonl(BufWriter<File>),
    Null,
}

/// Explicit log handle, passed to the engine at construction
pub struct EventLog {
    sink: Sink,
    record_count: u64,
}

impl EventLog {
    /// A log that keeps every record in memory.
    pub fn in_memory() -> Self {
        Self {
            sink: Sink::Memory(Vec::new()),
            record_count: 0,
        }
    }

    /// Create a log writing JSONL to the specified path
    pub fn jsonl(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            sink: Sink::Jsonl(BufWriter::new(file)),
            record_count: 0,
        })
    }

    /// Create a log that discards records (for batch runs)
    pub fn null() -> Self {
        Self {
            sink: Sink::Null,
            record_count: 0,
        }
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn log(&mut self, record: &TickRecord) -> Result<(), SimError> {
        self.record_count += 1;
        match &mut self.sink {
            Sink::Memory(records) => records.push(record.clone()),
            Sink::Jsonl(writer) => {
                let json = record.to_jsonl()?;
                writeln!(writer, "{}", json)?;
            }
            Sink::Null => {}
        }
        Ok(())
    }

    pub fn log_batch(&mut self, records: &[TickRecord]) -> Result<(), SimError> {
        for record in records {
            self.log(record)?;
        }
        Ok(())
    }

    /// Records retained in memory; empty for file-backed and null logs.
    pub fn records(&self) -> &[TickRecord] {
        match &self.sink {
            Sink::Memory(records) => records,
            _ => &[],
        }
    }

    /// Flush the buffer to disk
    pub fn flush(&mut self) -> Result<(), SimError> {
        if let Sink::Jsonl(writer) = &mut self.sink {
            writer.flush()?;
        }
        Ok(())
    }

    /// Writes the run summary as pretty JSON next to the event stream.
    pub fn write_summary(&mut self, path: impl AsRef<Path>, summary: &RunSummary) -> Result<(), SimError> {
        self.flush()?;
        std::fs::write(path, summary.to_json_pretty()?)?;
        Ok(())
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to flush event log");
        }
    }
}

/// Reads back a JSONL event stream.
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<TickRecord>, SimError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(TickRecord::from_jsonl(&line)?);
    }
    Ok(records)
}
