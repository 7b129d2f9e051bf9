//! # Outpost Logger
//!
//! Bounded, rotating log sessions for the Outpost device agent.
//!
//! Every subsystem of the agent (the command router, the updater, ...) owns
//! its own [`LogSession`]. A session writes plain text lines into one active
//! file at a time and keeps the on-disk footprint bounded:
//!
//! - **Rotation**: the active file is closed and a new one opened once the
//!   per-file message count or per-file duration bound is reached
//! - **Retention**: once enough rotations have happened, the oldest file the
//!   session created is deleted on every further rotation
//! - **Volatility presets**: named bounds from `minimal` to `hoarding`, or
//!   custom bounds supplied by the caller
//!
//! ## Quick Start
//!
//! ```no_run
//! use outpost_logger::{log_message, LogSession, VolatilityPolicy};
//!
//! fn main() -> outpost_logger::Result<()> {
//!     let mut session = LogSession::open("updater_package", VolatilityPolicy::minimal())?;
//!
//!     log_message!(session, "waiting for updates. sleeping {} seconds", 3600)?;
//!     session.append("localVersion: {}", &[&42])?;
//!     session.flush()?;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod format;
pub mod handle;
pub mod naming;
pub mod policy;
pub mod retention;
pub mod rotation;
pub mod session;
pub mod sink;


pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LoggerConfig, PolicyBounds};
pub use handle::{SessionWriter, SharedLogSession};
pub use naming::{find_log_files, log_file_name, LogFileInfo, LOG_EXTENSION};
pub use policy::{Volatility, VolatilityPolicy};
pub use session::{LogSession, SessionBuilder, SessionHealth, SessionStats};
pub use sink::{ConsoleSink, MemorySink, NullSink, StdoutSink};

use std::path::PathBuf;

/// Result type for logger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Logger-specific errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Log rotation error: {message}")]
    Rotation { message: String },

    #[error("Failed to prune log file {}: {source}", .path.display())]
    Prune {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Log session unavailable: {message}")]
    SessionUnavailable { message: String },
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// True for every variant backed by a filesystem failure
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Prune { .. })
    }
}

/// Render a message with `format!` syntax and append it to a session.
///
/// Works with both [`LogSession`] and [`SharedLogSession`] and evaluates to
/// the `Result` of the append.
#[macro_export]
macro_rules! log_message {
    ($session:expr, $($arg:tt)+) => {
        $session.append_fmt(::std::format_args!($($arg)+))
    };
}
