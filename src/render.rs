//! Response sinks
//!
//! Where answer text goes as it is produced: stdout for the driver, a
//! vector for tests, nowhere for delegated sub-queries.

use crate::Result;
use std::io::Write;

pub trait ResponseSink: Send {
    /// Receive the next piece of output, in order
    fn chunk(&mut self, text: &str) -> Result<()>;
}

/// Collects every chunk separately.
impl ResponseSink for Vec<String> {
    fn chunk(&mut self, text: &str) -> Result<()> {
        self.push(text.to_string());
        Ok(())
    }
}

/// Drops output; the caller only wants the returned `Response`.
pub struct NullSink;

impl ResponseSink for NullSink {
    fn chunk(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// Writes and flushes each chunk immediately.
pub struct ConsoleSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> ResponseSink for ConsoleSink<W> {
    fn chunk(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}
