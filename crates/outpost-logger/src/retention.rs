//! Log retention: pruning the oldest file a session created

use crate::{session::LogSession, Error, Result};
use metrics::counter;
use std::collections::VecDeque;
use std::path::PathBuf;
use tracing::{info, warn};

/// Files created by a session in creation order, oldest at the front
#[derive(Debug, Default, Clone)]
pub struct RetentionQueue {
    files: VecDeque<PathBuf>,
}

impl RetentionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_newest(&mut self, path: PathBuf) {
        self.files.push_back(path);
    }

    pub fn pop_oldest(&mut self) -> Option<PathBuf> {
        self.files.pop_front()
    }

    pub fn newest(&self) -> Option<&PathBuf> {
        self.files.back()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter()
    }
}

impl LogSession {
    /// Delete the single oldest tracked file.
    ///
    /// The tracking entry is dropped even when the delete fails so a path
    /// that can never be removed is not retried on every rotation. The
    /// active file is never a candidate.
    pub(crate) fn prune(&mut self) -> Result<()> {
        if self.tracked.len() <= 1 {
            return Ok(());
        }

        let Some(oldest) = self.tracked.pop_oldest() else {
            return Ok(());
        };

        match std::fs::remove_file(&oldest) {
            Ok(()) => {
                counter!("outpost.log.pruned").increment(1);
                info!(
                    outpost.event = "log_pruned",
                    base_name = %self.base_name,
                    file = %oldest.display(),
                    remaining = self.tracked.len(),
                    "Deleted oldest log file"
                );
                Ok(())
            }
            Err(source) => {
                counter!("outpost.log.prune_failures").increment(1);
                warn!(
                    outpost.event = "prune_failed",
                    base_name = %self.base_name,
                    file = %oldest.display(),
                    error = %source,
                    "Failed to delete oldest log file"
                );
                Err(Error::Prune {
                    path: oldest,
                    source,
                })
            }
        }
    }
}
