//! Recording session factory for tests.
//!
//! Counts starts and stops instead of touching the OS, and can be told to
//! fail either side.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::session::{Session, SessionError, SessionFactory};

#[derive(Debug, Default)]
struct Counters {
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
}

/// A [`SessionFactory`] that only records what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    counters: Arc<Counters>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions started so far.
    pub fn starts(&self) -> usize {
        self.counters.starts.load(Ordering::SeqCst)
    }

    /// Number of sessions stopped so far.
    pub fn stops(&self) -> usize {
        self.counters.stops.load(Ordering::SeqCst)
    }

    /// Sessions currently running.
    pub fn running(&self) -> usize {
        self.starts() - self.stops()
    }

    /// Make subsequent starts fail with a permission error.
    pub fn fail_starts(&self, fail: bool) {
        self.counters.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent stops report a detach failure.
    pub fn fail_stops(&self, fail: bool) {
        self.counters.fail_stop.store(fail, Ordering::SeqCst);
    }
}

struct RecordingSession {
    mountpoint: PathBuf,
    counters: Arc<Counters>,
}

#[async_trait]
impl Session for RecordingSession {
    async fn stop(self: Box<Self>) -> Result<(), SessionError> {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_stop.load(Ordering::SeqCst) {
            return Err(SessionError::detach(&self.mountpoint, "device busy"));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for RecordingFactory {
    async fn start(&self, _name: &str, mountpoint: &Path) -> Result<Box<dyn Session>, SessionError> {
        if self.counters.fail_start.load(Ordering::SeqCst) {
            return Err(SessionError::attach(
                mountpoint,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
            ));
        }
        // Yield so concurrent callers really interleave around the registry lock
        tokio::task::yield_now().await;

        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSession {
            mountpoint: mountpoint.to_path_buf(),
            counters: Arc::clone(&self.counters),
        }))
    }
}
