//! Volume operation errors.
//!
//! The `Display` text of each variant is what the plugin host sees.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionError;

/// Volume lifecycle error.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// No active mount for the volume.
    #[error("unable to find volume mounted on {}", mountpoint.display())]
    NotFound { mountpoint: PathBuf },

    /// The mountpoint path exists and is not a directory.
    #[error("{} already exists and is not a directory", mountpoint.display())]
    Conflict { mountpoint: PathBuf },

    /// The mountpoint is the volume root, or lies inside or above another
    /// active mount.
    #[error("{} overlaps the volume root or another mounted volume", mountpoint.display())]
    Overlap { mountpoint: PathBuf },

    /// Creating or inspecting the mountpoint directory failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The filesystem session could not be started.
    #[error(transparent)]
    SessionStart(SessionError),

    /// The filesystem session did not stop cleanly.
    #[error(transparent)]
    SessionStop(SessionError),
}

impl VolumeError {
    pub fn not_found(mountpoint: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            mountpoint: mountpoint.into(),
        }
    }

    pub fn conflict(mountpoint: impl Into<PathBuf>) -> Self {
        Self::Conflict {
            mountpoint: mountpoint.into(),
        }
    }

    pub fn overlap(mountpoint: impl Into<PathBuf>) -> Self {
        Self::Overlap {
            mountpoint: mountpoint.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for [`VolumeError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Volume result type.
pub type VolumeResult<T> = Result<T, VolumeError>;
