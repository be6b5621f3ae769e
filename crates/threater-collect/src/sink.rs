//! Event sinks
//!
//! Events are written as JSON lines:
//! `{"sourcetype":"threater:port","event":{...raw record...}}`.

use crate::api::types::Record;
use crate::error::{CollectError, Result};
use serde::Serialize;
use serde_json::value::RawValue;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Stdout, Write};
use std::path::Path;
use tracing::debug;

/// One record on its way to the host platform
#[derive(Debug, Clone)]
pub struct Event {
    pub sourcetype: String,
    pub payload: Record,
}

impl Event {
    pub fn new(sourcetype: impl Into<String>, payload: Record) -> Self {
        Self {
            sourcetype: sourcetype.into(),
            payload,
        }
    }
}

/// Destination for emitted events
pub trait EventSink: Send {
    fn write(&mut self, event: &Event) -> Result<()>;

    /// Make every event written so far durable.
    fn flush(&mut self) -> Result<()>;
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn write(&mut self, event: &Event) -> Result<()> {
        (**self).write(event)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

#[derive(Serialize)]
struct Line<'a> {
    sourcetype: &'a str,
    event: &'a RawValue,
}

/// Newline-delimited JSON writer
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    written: u64,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    #[cfg(test)]
    pub fn written(&self) -> u64 {
        self.written
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<BufWriter<Stdout>> {
    pub fn stdout() -> Self {
        Self::new(BufWriter::new(std::io::stdout()))
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Append to `path`, creating it if missing.
    pub fn append_file(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CollectError::sink(format!("cannot open '{}': {}", path.display(), e)))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn write(&mut self, event: &Event) -> Result<()> {
        let line = Line {
            sourcetype: &event.sourcetype,
            event: &event.payload,
        };
        serde_json::to_writer(&mut self.writer, &line)
            .map_err(|e| CollectError::sink(format!("cannot write event: {}", e)))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| CollectError::sink(format!("cannot write event: {}", e)))?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| CollectError::sink(format!("cannot flush events: {}", e)))?;
        debug!(events = self.written, "sink flushed");
        Ok(())
    }
}

/// Stdout, or the given file in append mode.
pub fn open(output: Option<&Path>) -> Result<Box<dyn EventSink>> {
    Ok(match output {
        Some(path) => Box::new(JsonLinesSink::append_file(path)?),
        None => Box::new(JsonLinesSink::stdout()),
    })
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Vec<Event>,
    pub flushes: usize,
    /// Events written before the most recent flush
    pub flushed: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw payload text of every event, in write order
    pub fn payloads(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.payload.get()).collect()
    }
}

impl EventSink for MemorySink {
    fn write(&mut self, event: &Event) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        self.flushed = self.events.len();
        Ok(())
    }
}
