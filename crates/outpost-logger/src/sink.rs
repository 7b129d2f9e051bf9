//! Console mirroring for rendered log lines

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Destination that receives a copy of every rendered line.
///
/// Mirroring is best effort: a session logs a failed mirror and moves on.
pub trait ConsoleSink: Send {
    fn mirror(&mut self, line: &str) -> io::Result<()>;
}

/// Mirrors lines to the process standard output for local watchers
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl ConsoleSink for StdoutSink {
    fn mirror(&mut self, line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", line)
    }
}

/// Discards every line
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ConsoleSink for NullSink {
    fn mirror(&mut self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps mirrored lines in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything mirrored so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl ConsoleSink for MemorySink {
    fn mirror(&mut self, line: &str) -> io::Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory sink poisoned"))?;
        lines.push(line.to_string());
        Ok(())
    }
}
