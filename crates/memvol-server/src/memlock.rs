//! Keep volume contents out of swap.
//!
//! Volumes live in this process's heap, so locking every current and future
//! page stops their contents from being written to disk.

use std::io;

use rustix::io::Errno;
use rustix::mm::{MlockAllFlags, mlockall};

/// Outcome of [`lock_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemLock {
    /// All pages are locked.
    Locked,
    /// The platform does not implement `mlockall`.
    Unsupported,
    /// The memlock limit is too low to lock everything.
    InsufficientResources,
}

/// Lock all current and future pages of the process.
///
/// The two expected refusals come back as `Ok` variants for the caller to
/// warn about; anything else is an error.
pub fn lock_all() -> io::Result<MemLock> {
    classify(mlockall(MlockAllFlags::CURRENT | MlockAllFlags::FUTURE))
}

fn classify(result: Result<(), Errno>) -> io::Result<MemLock> {
    match result {
        Ok(()) => Ok(MemLock::Locked),
        Err(errno) if errno == Errno::NOSYS => Ok(MemLock::Unsupported),
        Err(errno) if errno == Errno::NOMEM => Ok(MemLock::InsufficientResources),
        Err(errno) => Err(errno.into()),
    }
}
