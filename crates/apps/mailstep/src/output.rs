//! JSON-lines output sink

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes one JSON document per line
pub struct JsonLinesWriter<W: Write> {
    inner: BufWriter<W>,
    lines: usize,
}

impl JsonLinesWriter<Box<dyn Write>> {
    /// Open `path` for writing (truncating it), or stdout when no path is given
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let sink: Box<dyn Write> = match path {
            Some(path) => Box::new(
                File::create(path)
                    .with_context(|| format!("Failed to create output file: {}", path.display()))?,
            ),
            None => Box::new(std::io::stdout()),
        };
        Ok(Self::new(sink))
    }
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
            lines: 0,
        }
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.inner, record).context("Failed to serialize output record")?;
        self.inner
            .write_all(b"\n")
            .context("Failed to write output record")?;
        self.lines += 1;
        Ok(())
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Flush buffered lines and hand back the underlying writer
    pub fn finish(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush output: {}", e.error()))
    }
}
