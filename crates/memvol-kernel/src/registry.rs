//! Mount registry: the table of active volume mounts.
//!
//! Maps mountpoints to running sessions and counts how many consumers hold
//! each one. A single exclusive lock serializes every operation, including
//! the session start/stop calls made while it is held, so two concurrent
//! mounts of one volume can never both start a session and an unmount only
//! returns once the filesystem is detached.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{VolumeError, VolumeResult};
use crate::mountpoint::mountpoint;
use crate::session::{Session, SessionFactory};

/// Permissions for mountpoint directories we create.
const MOUNTPOINT_MODE: u32 = 0o755;

/// Snapshot of one active mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// Volume name the mount was created for.
    pub name: String,
    /// Where the volume is mounted.
    pub mountpoint: PathBuf,
}

struct MountEntry {
    name: String,
    session: Box<dyn Session>,
    /// Always >= 1 while the entry is in the table.
    ref_count: usize,
}

/// Reference-counted table of mounted volumes.
pub struct MountRegistry {
    root: PathBuf,
    sessions: Arc<dyn SessionFactory>,
    /// Active mounts, keyed by mountpoint.
    mounts: Mutex<BTreeMap<PathBuf, MountEntry>>,
}

impl std::fmt::Debug for MountRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountRegistry")
            .field("root", &self.root)
            .field("mounts", &"<locked>")
            .finish()
    }
}

impl MountRegistry {
    /// Create an empty registry serving volumes under `root`.
    pub fn new(root: impl Into<PathBuf>, sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            root: root.into(),
            sessions,
            mounts: Mutex::new(BTreeMap::new()),
        }
    }

    /// Directory all mountpoints live under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mountpoint for a volume name.
    pub fn mountpoint(&self, name: &str) -> PathBuf {
        mountpoint(&self.root, name)
    }

    /// Find the active mount for `name`.
    pub async fn lookup(&self, name: &str) -> VolumeResult<MountInfo> {
        let mountpoint = self.mountpoint(name);
        let mounts = self.mounts.lock().await;

        mounts
            .get(&mountpoint)
            .map(|entry| MountInfo {
                name: entry.name.clone(),
                mountpoint: mountpoint.clone(),
            })
            .ok_or_else(|| VolumeError::not_found(&mountpoint))
    }

    /// All active mounts, ordered by mountpoint.
    pub async fn list(&self) -> Vec<MountInfo> {
        let mounts = self.mounts.lock().await;
        mounts
            .iter()
            .map(|(mountpoint, entry)| MountInfo {
                name: entry.name.clone(),
                mountpoint: mountpoint.clone(),
            })
            .collect()
    }

    /// Outstanding mounts of `name`; 0 when it is not mounted.
    pub async fn ref_count(&self, name: &str) -> usize {
        let mountpoint = self.mountpoint(name);
        let mounts = self.mounts.lock().await;
        mounts.get(&mountpoint).map_or(0, |entry| entry.ref_count)
    }

    /// Mount `name`, starting its session if nobody holds it yet.
    ///
    /// Returns the mountpoint. On failure the table is left untouched.
    pub async fn mount(&self, name: &str) -> VolumeResult<PathBuf> {
        let mountpoint = self.mountpoint(name);
        let mut mounts = self.mounts.lock().await;

        if let Some(entry) = mounts.get_mut(&mountpoint) {
            entry.ref_count += 1;
            debug!(
                volume = name,
                mountpoint = %mountpoint.display(),
                ref_count = entry.ref_count,
                "volume already mounted"
            );
            return Ok(mountpoint);
        }

        // Never stack a session on the root or inside another volume's tree
        let overlaps = mountpoint == self.root
            || mounts
                .keys()
                .any(|other| mountpoint.starts_with(other) || other.starts_with(&mountpoint));
        if overlaps {
            warn!(volume = name, mountpoint = %mountpoint.display(), "refusing overlapping mount");
            return Err(VolumeError::overlap(&mountpoint));
        }

        info!(volume = name, mountpoint = %mountpoint.display(), "mounting volume");
        prepare_mountpoint(&mountpoint).await?;

        let session = self
            .sessions
            .start(name, &mountpoint)
            .await
            .map_err(VolumeError::SessionStart)?;

        mounts.insert(
            mountpoint.clone(),
            MountEntry {
                name: name.to_string(),
                session,
                ref_count: 1,
            },
        );
        info!(volume = name, mountpoint = %mountpoint.display(), "volume mounted");
        Ok(mountpoint)
    }

    /// Release one mount of `name`, stopping the session on the last one.
    pub async fn unmount(&self, name: &str) -> VolumeResult<()> {
        let mountpoint = self.mountpoint(name);
        let mut mounts = self.mounts.lock().await;

        let remaining = match mounts.get_mut(&mountpoint) {
            Some(entry) => {
                entry.ref_count -= 1;
                entry.ref_count
            }
            None => return Err(VolumeError::not_found(&mountpoint)),
        };

        if remaining > 0 {
            debug!(
                volume = name,
                mountpoint = %mountpoint.display(),
                ref_count = remaining,
                "volume still in use"
            );
            return Ok(());
        }

        match mounts.remove(&mountpoint) {
            Some(entry) => stop_session(&mountpoint, entry).await,
            None => Ok(()),
        }
    }

    /// Drop the mount for `name` if at most one consumer still holds it.
    ///
    /// Missing volumes are not an error. The session is stopped before the
    /// entry goes away so no serving thread is orphaned.
    pub async fn remove(&self, name: &str) -> VolumeResult<()> {
        let mountpoint = self.mountpoint(name);
        let mut mounts = self.mounts.lock().await;

        match mounts.get(&mountpoint) {
            Some(entry) if entry.ref_count <= 1 => {}
            Some(entry) => {
                debug!(
                    volume = name,
                    ref_count = entry.ref_count,
                    "volume still in use, not removing"
                );
                return Ok(());
            }
            None => return Ok(()),
        }

        match mounts.remove(&mountpoint) {
            Some(entry) => stop_session(&mountpoint, entry).await,
            None => Ok(()),
        }
    }

    /// Stop every session and empty the table.
    pub async fn shutdown(&self) {
        let mut mounts = self.mounts.lock().await;
        let drained = std::mem::take(&mut *mounts);

        for (mountpoint, entry) in drained {
            // Already logged inside stop_session
            let _ = stop_session(&mountpoint, entry).await;
        }
    }
}

async fn stop_session(mountpoint: &Path, entry: MountEntry) -> VolumeResult<()> {
    info!(volume = %entry.name, mountpoint = %mountpoint.display(), "unmounting volume");
    entry.session.stop().await.map_err(|e| {
        warn!(volume = %entry.name, error = %e, "session did not stop cleanly");
        VolumeError::SessionStop(e)
    })
}

/// Make sure `mountpoint` is a directory, creating it if missing.
async fn prepare_mountpoint(mountpoint: &Path) -> VolumeResult<()> {
    match tokio::fs::symlink_metadata(mountpoint).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(VolumeError::conflict(mountpoint)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => tokio::fs::DirBuilder::new()
            .recursive(true)
            .mode(MOUNTPOINT_MODE)
            .create(mountpoint)
            .await
            .map_err(|e| VolumeError::io(mountpoint, e)),
        Err(e) => Err(VolumeError::io(mountpoint, e)),
    }
}
