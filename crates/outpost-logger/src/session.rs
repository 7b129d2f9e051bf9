//! Log session: one logical stream of log lines spread across rotated files

use crate::{
    clock::{Clock, SystemClock},
    format,
    policy::VolatilityPolicy,
    retention::RetentionQueue,
    rotation::create_log_file,
    sink::{ConsoleSink, StdoutSink},
    Error, Result,
};
use metrics::counter;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Whether a session can still accept writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionHealth {
    Healthy,
    /// Rotation could not open a new file; the session has no destination
    Failed { reason: String },
}

impl SessionHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, SessionHealth::Healthy)
    }
}

/// Point-in-time view of a session's counters
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub base_name: String,
    pub policy: VolatilityPolicy,
    pub active_file: PathBuf,
    pub message_count: u64,
    pub elapsed_seconds: u64,
    pub rotation_count: u64,
    pub tracked_files: Vec<PathBuf>,
    pub health: SessionHealth,
}

/// A rotating log owned by a single writer.
///
/// Exactly one file is open at a time. Every append may rotate the active
/// file and prune the oldest file the session created; both happen inline
/// and their failures are returned from the append that triggered them.
pub struct LogSession {
    pub(crate) policy: VolatilityPolicy,
    pub(crate) base: PathBuf,
    pub(crate) base_name: String,
    pub(crate) writer: Option<BufWriter<File>>,
    pub(crate) active_path: PathBuf,
    pub(crate) message_count: u64,
    pub(crate) elapsed_seconds: u64,
    pub(crate) last_write_epoch: i64,
    pub(crate) rotation_count: u64,
    pub(crate) tracked: RetentionQueue,
    pub(crate) health: SessionHealth,
    pub(crate) clock: Box<dyn Clock>,
    sink: Box<dyn ConsoleSink>,
}

/// Builder for sessions that need a custom clock or console sink
pub struct SessionBuilder {
    base: PathBuf,
    policy: VolatilityPolicy,
    clock: Box<dyn Clock>,
    sink: Box<dyn ConsoleSink>,
}

impl SessionBuilder {
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn sink(mut self, sink: impl ConsoleSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn boxed_sink(mut self, sink: Box<dyn ConsoleSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Create the first log file and return the ready session
    pub fn open(self) -> Result<LogSession> {
        LogSession::open_with(self.base, self.policy, self.clock, self.sink)
    }
}

impl LogSession {
    /// Open a session that mirrors to stdout and uses the system clock.
    ///
    /// `base` is the stable prefix of every file name and may contain
    /// directories, e.g. `/var/log/outpost/rest_package`.
    pub fn open(base: impl AsRef<Path>, policy: VolatilityPolicy) -> Result<Self> {
        Self::builder(base, policy).open()
    }

    /// Open a session using the preset selected by a volatility code.
    ///
    /// An unknown code fails before any file is created.
    pub fn from_code(base: impl AsRef<Path>, code: u8) -> Result<Self> {
        let policy = VolatilityPolicy::from_code(code)?;
        Self::open(base, policy)
    }

    /// Open a session with explicit bounds
    pub fn custom(
        base: impl AsRef<Path>,
        max_files: u64,
        max_messages: u64,
        max_duration_seconds: u64,
    ) -> Result<Self> {
        let policy = VolatilityPolicy::custom(max_files, max_messages, max_duration_seconds)?;
        Self::open(base, policy)
    }

    pub fn builder(base: impl AsRef<Path>, policy: VolatilityPolicy) -> SessionBuilder {
        SessionBuilder {
            base: base.as_ref().to_path_buf(),
            policy,
            clock: Box::new(SystemClock),
            sink: Box::new(StdoutSink),
        }
    }

    fn open_with(
        base: PathBuf,
        policy: VolatilityPolicy,
        clock: Box<dyn Clock>,
        sink: Box<dyn ConsoleSink>,
    ) -> Result<Self> {
        let base_name = base
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                Error::config(format!(
                    "log base name '{}' does not end in a usable file name",
                    base.display()
                ))
            })?
            .to_string();

        if let Some(parent) = base.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let now = clock.now();
        let (active_path, file) = create_log_file(&base, now)?;

        let mut tracked = RetentionQueue::new();
        tracked.push_newest(active_path.clone());

        debug!(
            outpost.event = "session_opened",
            base_name = %base_name,
            file_path = %active_path.display(),
            max_files = policy.max_files,
            max_messages = policy.max_messages,
            max_duration_seconds = policy.max_duration_seconds,
            "Log session opened"
        );

        Ok(Self {
            policy,
            base,
            base_name,
            writer: Some(BufWriter::new(file)),
            active_path,
            message_count: 0,
            elapsed_seconds: 0,
            last_write_epoch: now.timestamp(),
            rotation_count: 0,
            tracked,
            health: SessionHealth::Healthy,
            clock,
            sink,
        })
    }

    /// Render `template` with `{}` placeholders and append it as one line.
    ///
    /// Placeholder mismatches are rendered as markers instead of failing.
    /// Errors come from the write itself or from a rotation it triggered.
    pub fn append(&mut self, template: &str, args: &[&dyn fmt::Display]) -> Result<()> {
        let line = format::render(template, args);
        self.append_line(&line)
    }

    /// Append a message built with `format_args!`, see [`crate::log_message!`]
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        let line = format::render_args(args);
        self.append_line(&line)
    }

    /// Append an already rendered line
    pub fn append_line(&mut self, line: &str) -> Result<()> {
        let record = frame_line(line);
        self.writer_mut()?.write_all(record.as_bytes())?;

        if let Err(e) = self.sink.mirror(line) {
            debug!(
                outpost.event = "mirror_failed",
                base_name = %self.base_name,
                error = %e,
                "Failed to mirror log line to console"
            );
        }

        self.message_count += 1;
        counter!("outpost.log.messages").increment(1);

        let now = self.clock.now().timestamp();
        self.elapsed_seconds += now.saturating_sub(self.last_write_epoch).max(0) as u64;
        self.last_write_epoch = now;

        if self.rotation_due() {
            self.rotate()?;
        }

        Ok(())
    }

    /// Push buffered lines to the active file. Never rotates.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Flush, then read the whole active file. Rotated files are not included.
    pub fn current_contents(&mut self) -> Result<Vec<u8>> {
        self.writer_mut()?.flush()?;
        Ok(std::fs::read(&self.active_path)?)
    }

    /// File name of the active log, checked against the open handle
    pub fn current_name(&self) -> Result<String> {
        let writer = self
            .writer
            .as_ref()
            .ok_or_else(|| unavailable(&self.health))?;
        writer.get_ref().metadata()?;

        self.active_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| Error::SessionUnavailable {
                message: format!("active log path {} has no name", self.active_path.display()),
            })
    }

    pub fn current_path(&self) -> &Path {
        &self.active_path
    }

    pub fn health(&self) -> &SessionHealth {
        &self.health
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    pub fn policy(&self) -> &VolatilityPolicy {
        &self.policy
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Messages written to the active file
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Seconds the active file has been accumulating messages
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Rotations over the lifetime of the session
    pub fn rotation_count(&self) -> u64 {
        self.rotation_count
    }

    /// Files created by this session that have not been pruned, oldest first
    pub fn tracked_files(&self) -> Vec<PathBuf> {
        self.tracked.iter().cloned().collect()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            base_name: self.base_name.clone(),
            policy: self.policy,
            active_file: self.active_path.clone(),
            message_count: self.message_count,
            elapsed_seconds: self.elapsed_seconds,
            rotation_count: self.rotation_count,
            tracked_files: self.tracked_files(),
            health: self.health.clone(),
        }
    }

    fn writer_mut(&mut self) -> Result<&mut BufWriter<File>> {
        match self.writer.as_mut() {
            Some(writer) => Ok(writer),
            None => Err(unavailable(&self.health)),
        }
    }
}

// Line plus terminator, handed to the writer in a single `write_all`
fn frame_line(line: &str) -> String {
    let mut record = String::with_capacity(line.len() + 1);
    record.push_str(line);
    record.push('\n');
    record
}

fn unavailable(health: &SessionHealth) -> Error {
    let message = match health {
        SessionHealth::Failed { reason } => reason.clone(),
        SessionHealth::Healthy => "no active log file".to_string(),
    };
    Error::SessionUnavailable { message }
}

impl fmt::Debug for LogSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSession")
            .field("base", &self.base)
            .field("policy", &self.policy)
            .field("active_path", &self.active_path)
            .field("message_count", &self.message_count)
            .field("elapsed_seconds", &self.elapsed_seconds)
            .field("rotation_count", &self.rotation_count)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl Drop for LogSession {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(
                outpost.event = "final_flush_failed",
                base_name = %self.base_name,
                error = %e,
                "Failed to flush log session on drop"
            );
        }
    }
}
