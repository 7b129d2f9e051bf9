//! Log file rotation

use crate::{naming, session::LogSession, session::SessionHealth, Error, Result};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Upper bound on name collisions tolerated before giving up on a timestamp
const MAX_NAME_ATTEMPTS: u32 = 1_000;

/// Create a new, never-before-used log file for `base` stamped with `at`.
///
/// A name that already exists (two files within one clock tick) is retried
/// one nanosecond later, so names stay unique and keep sorting in creation
/// order.
pub(crate) fn create_log_file(base: &Path, at: DateTime<Utc>) -> io::Result<(PathBuf, File)> {
    let mut stamp = at;

    for _ in 0..MAX_NAME_ATTEMPTS {
        let path = naming::log_file_path(base, stamp);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                stamp += Duration::nanoseconds(1);
            }
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!(
            "no unused log file name for {} after {} attempts",
            base.display(),
            MAX_NAME_ATTEMPTS
        ),
    ))
}

impl LogSession {
    /// True once the active file reached its message or duration bound
    pub(crate) fn rotation_due(&self) -> bool {
        self.message_count >= self.policy.max_messages
            || self.elapsed_seconds >= self.policy.max_duration_seconds
    }

    /// Close the active file and continue in a freshly created one.
    ///
    /// The old file is flushed and closed before the new one is created, so
    /// at most one handle is open at any time. If either step fails the
    /// session is left without a destination and marked failed.
    pub(crate) fn rotate(&mut self) -> Result<()> {
        if let Some(mut old) = self.writer.take() {
            if let Err(e) = old.flush() {
                return Err(self.fail_rotation(format!(
                    "failed to flush {} before rotation: {}",
                    self.active_path.display(),
                    e
                )));
            }
        }

        let now = self.clock.now();
        let (new_path, file) = match create_log_file(&self.base, now) {
            Ok(created) => created,
            Err(e) => {
                return Err(self.fail_rotation(format!(
                    "failed to create a new log file for {}: {}",
                    self.base.display(),
                    e
                )));
            }
        };

        let old_path = std::mem::replace(&mut self.active_path, new_path.clone());
        self.writer = Some(BufWriter::new(file));

        self.message_count = 0;
        self.elapsed_seconds = 0;
        self.last_write_epoch = now.timestamp();
        self.rotation_count += 1;
        self.tracked.push_newest(new_path);

        counter!("outpost.log.rotations").increment(1);
        info!(
            outpost.event = "log_rotated",
            base_name = %self.base_name,
            old_file = %old_path.display(),
            new_file = %self.active_path.display(),
            rotation_count = self.rotation_count,
            "Log file rotated"
        );

        if self.rotation_count >= self.policy.max_files {
            self.prune()?;
        }

        Ok(())
    }

    fn fail_rotation(&mut self, reason: String) -> Error {
        error!(
            outpost.event = "rotation_failed",
            base_name = %self.base_name,
            reason = %reason,
            "Log session can no longer write"
        );

        self.writer = None;
        self.health = SessionHealth::Failed {
            reason: reason.clone(),
        };
        Error::Rotation { message: reason }
    }
}
