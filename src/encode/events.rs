use std::io::Write;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::dsp::event::Event;
use crate::element::EmittedEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EventFormat {
    /// `onset` / `offset` lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Serialize)]
struct EventRecord {
    event: Event,
    index: u64,
    time: f64,
}

/// Serialises events to a byte sink, one line each.
pub struct EventWriter<W: Write> {
    out: W,
    format: EventFormat,
    written: u64,
}

impl<W: Write> EventWriter<W> {
    pub fn new(out: W, format: EventFormat) -> Self {
        Self {
            out,
            format,
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write(&mut self, emitted: &EmittedEvent) -> Result<()> {
        match self.format {
            EventFormat::Text => self
                .out
                .write_all(emitted.event.line().as_bytes())
                .context("Failed to write event")?,
            EventFormat::Json => {
                let record = EventRecord {
                    event: emitted.event,
                    index: emitted.index,
                    time: emitted.time,
                };
                serde_json::to_writer(&mut self.out, &record).context("Failed to serialise event")?;
                self.out.write_all(b"\n").context("Failed to write event")?;
            }
        }
        self.written += 1;
        Ok(())
    }

    pub fn write_all(&mut self, events: &[EmittedEvent]) -> Result<()> {
        for event in events {
            self.write(event)?;
        }
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().context("Failed to flush events")
    }
}
