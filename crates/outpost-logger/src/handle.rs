//! Shared, lock-guarded access to a log session

use crate::{
    session::{LogSession, SessionHealth, SessionStats},
    Error, Result,
};
use std::cell::RefCell;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

thread_local! {
    // Sessions whose lock the current thread holds, innermost last
    static HELD_SESSIONS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

fn held_by_current_thread(id: usize) -> bool {
    HELD_SESSIONS.with(|held| held.borrow().contains(&id))
}

/// Clonable handle that serializes every operation on one session.
///
/// Collaborators that need to log from several tasks share a handle instead
/// of the session itself; each call takes the session lock for its whole
/// duration, rotation and pruning included.
#[derive(Clone)]
pub struct SharedLogSession {
    inner: Arc<Mutex<LogSession>>,
}

struct HeldSession<'a> {
    guard: MutexGuard<'a, LogSession>,
    id: usize,
}

impl Drop for HeldSession<'_> {
    fn drop(&mut self) {
        HELD_SESSIONS.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(pos) = held.iter().rposition(|id| *id == self.id) {
                held.remove(pos);
            }
        });
    }
}

impl SharedLogSession {
    pub fn new(session: LogSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Run `f` with exclusive access to the session
    pub fn with<R>(&self, f: impl FnOnce(&mut LogSession) -> R) -> Result<R> {
        let mut held = self.lock()?;
        Ok(f(&mut *held.guard))
    }

    pub fn append(&self, template: &str, args: &[&dyn fmt::Display]) -> Result<()> {
        self.with(|session| session.append(template, args))?
    }

    pub fn append_fmt(&self, args: fmt::Arguments<'_>) -> Result<()> {
        self.with(|session| session.append_fmt(args))?
    }

    pub fn append_line(&self, line: &str) -> Result<()> {
        self.with(|session| session.append_line(line))?
    }

    pub fn flush(&self) -> Result<()> {
        self.with(|session| session.flush())?
    }

    pub fn current_contents(&self) -> Result<Vec<u8>> {
        self.with(|session| session.current_contents())?
    }

    pub fn current_name(&self) -> Result<String> {
        self.with(|session| session.current_name())?
    }

    pub fn health(&self) -> Result<SessionHealth> {
        self.with(|session| session.health().clone())
    }

    /// False when rotation failed or the lock was poisoned
    pub fn is_healthy(&self) -> bool {
        self.with(|session| session.is_healthy()).unwrap_or(false)
    }

    pub fn stats(&self) -> Result<SessionStats> {
        self.with(|session| session.stats())
    }

    /// A `std::io::Write` adapter turning each written line into an append
    pub fn writer(&self) -> SessionWriter {
        SessionWriter {
            session: self.clone(),
            pending: Vec::new(),
        }
    }

    fn lock(&self) -> Result<HeldSession<'_>> {
        let guard = self.inner.lock().map_err(|_| Error::SessionUnavailable {
            message: "log session lock poisoned".to_string(),
        })?;
        let id = self.id();
        HELD_SESSIONS.with(|held| held.borrow_mut().push(id));
        Ok(HeldSession { guard, id })
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl From<LogSession> for SharedLogSession {
    fn from(session: LogSession) -> Self {
        Self::new(session)
    }
}

impl fmt::Debug for SharedLogSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedLogSession").finish_non_exhaustive()
    }
}

/// Line-buffering writer over a [`SharedLogSession`].
///
/// Every complete line becomes one append. A trailing partial line is
/// appended on flush or drop. Output produced while the current thread
/// already holds this writer's own session lock (the session's own rotation
/// diagnostics) is discarded instead of re-entering the lock. Writes into
/// any other session go through.
pub struct SessionWriter {
    session: SharedLogSession,
    pending: Vec<u8>,
}

impl SessionWriter {
    fn emit(&self, line: &[u8]) -> io::Result<()> {
        let text = String::from_utf8_lossy(line);
        let text: &str = text.strip_suffix('\r').unwrap_or(text.as_ref());
        self.session
            .append_line(text)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn emit_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let line = std::mem::take(&mut self.pending);
        self.emit(&line)
    }
}

impl io::Write for SessionWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if held_by_current_thread(self.session.id()) {
            return Ok(buf.len());
        }

        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.emit(&line[..pos])?;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if held_by_current_thread(self.session.id()) {
            return Ok(());
        }

        self.emit_pending()?;
        self.session
            .flush()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

impl Drop for SessionWriter {
    fn drop(&mut self) {
        if !held_by_current_thread(self.session.id()) {
            let _ = self.emit_pending();
        }
    }
}

// Route a `tracing-subscriber` fmt layer into a rotating session
impl<'a> MakeWriter<'a> for SharedLogSession {
    type Writer = SessionWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::VolatilityPolicy;
    use crate::sink::NullSink;
    use std::io::Write;
    use std::thread;
    use tempfile::TempDir;

    fn shared(dir: &TempDir, policy: VolatilityPolicy) -> SharedLogSession {
        named(dir, "shared", policy)
    }

    fn named(dir: &TempDir, base: &str, policy: VolatilityPolicy) -> SharedLogSession {
        LogSession::builder(dir.path().join(base), policy)
            .sink(NullSink)
            .open()
            .unwrap()
            .into()
    }

    #[test]
    fn test_concurrent_appends_are_serialized() {
        let temp_dir = TempDir::new().unwrap();
        let session = shared(&temp_dir, VolatilityPolicy::minimal());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let session = session.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        crate::log_message!(session, "thread {} message {}", t, i).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let contents = String::from_utf8(session.current_contents().unwrap()).unwrap();
        assert_eq!(contents.lines().count(), 100);
        assert!(contents.lines().all(|l| l.starts_with("thread ")));
        assert_eq!(session.stats().unwrap().message_count, 100);
    }

    #[test]
    fn test_writer_splits_lines() {
        let temp_dir = TempDir::new().unwrap();
        let session = shared(&temp_dir, VolatilityPolicy::minimal());

        let mut writer = session.writer();
        writer.write_all(b"first\nsec").unwrap();
        writer.write_all(b"ond\r\nthird").unwrap();
        drop(writer);

        let contents = String::from_utf8(session.current_contents().unwrap()).unwrap();
        assert_eq!(contents, "first\nsecond\nthird\n");
    }

    #[test]
    fn test_tracing_output_routed_into_session() {
        let temp_dir = TempDir::new().unwrap();
        let policy = VolatilityPolicy::custom(10, 2, 999_999).unwrap();
        let session = shared(&temp_dir, policy);

        let subscriber = tracing_subscriber::fmt()
            .with_writer(session.clone())
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("checking in");
            tracing::warn!("rotating now");
            tracing::warn!("after rotation");
        });

        assert_eq!(session.stats().unwrap().rotation_count, 1);
        let contents = String::from_utf8(session.current_contents().unwrap()).unwrap();
        assert!(contents.contains("after rotation"));
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_rotation_events_reach_another_session() {
        let temp_dir = TempDir::new().unwrap();
        let router = named(
            &temp_dir,
            "router",
            VolatilityPolicy::custom(10, 1, 999_999).unwrap(),
        );
        let diag = named(&temp_dir, "diag", VolatilityPolicy::minimal());

        let subscriber = tracing_subscriber::fmt()
            .with_writer(diag.clone())
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            router.append_line("triggers rotation").unwrap();
        });

        assert_eq!(router.stats().unwrap().rotation_count, 1);
        let contents = String::from_utf8(diag.current_contents().unwrap()).unwrap();
        assert!(contents.contains("Log file rotated"));
    }

    #[test]
    fn test_nested_locks_keep_outer_session_guarded() {
        let temp_dir = TempDir::new().unwrap();
        let outer = named(&temp_dir, "outer", VolatilityPolicy::minimal());
        let inner = named(&temp_dir, "inner", VolatilityPolicy::minimal());

        let subscriber = tracing_subscriber::fmt()
            .with_writer(outer.clone())
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            outer
                .with(|_| {
                    inner.append_line("nested").unwrap();
                    tracing::warn!("emitted while outer is held");
                })
                .unwrap();
            tracing::warn!("emitted after release");
        });

        let inner_contents = String::from_utf8(inner.current_contents().unwrap()).unwrap();
        assert_eq!(inner_contents, "nested\n");

        let outer_contents = String::from_utf8(outer.current_contents().unwrap()).unwrap();
        assert!(!outer_contents.contains("emitted while outer is held"));
        assert!(outer_contents.contains("emitted after release"));
    }

    #[test]
    fn test_health_reported_through_handle() {
        let temp_dir = TempDir::new().unwrap();
        let session = shared(&temp_dir, VolatilityPolicy::minimal());

        assert!(session.is_healthy());
        assert_eq!(session.health().unwrap(), SessionHealth::Healthy);
        assert!(session.current_name().unwrap().starts_with("shared_["));
    }
}
