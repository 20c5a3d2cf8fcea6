//! Filesystem session seam.
//!
//! A session is one running filesystem server attached to one mountpoint.
//! The registry only ever starts and stops sessions; it never looks inside.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors attaching or detaching a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The OS refused the mount (permission denied, busy path, no /dev/fuse).
    #[error("failed to mount filesystem on {}: {source}", mountpoint.display())]
    Attach {
        mountpoint: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Tearing the session down failed.
    #[error("failed to unmount filesystem from {}: {message}", mountpoint.display())]
    Detach { mountpoint: PathBuf, message: String },
}

impl SessionError {
    pub fn attach(mountpoint: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Attach {
            mountpoint: mountpoint.into(),
            source,
        }
    }

    pub fn detach(mountpoint: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Detach {
            mountpoint: mountpoint.into(),
            message: message.into(),
        }
    }
}

/// A running filesystem session.
#[async_trait]
pub trait Session: Send {
    /// Unmount and wait for the serving task to finish.
    async fn stop(self: Box<Self>) -> Result<(), SessionError>;
}

/// Starts sessions on demand.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Serve a fresh, empty filesystem labelled `name` at `mountpoint`.
    ///
    /// The mountpoint directory already exists when this is called.
    async fn start(&self, name: &str, mountpoint: &Path) -> Result<Box<dyn Session>, SessionError>;
}
