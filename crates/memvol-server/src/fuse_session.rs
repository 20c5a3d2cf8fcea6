//! FUSE-backed sessions.
//!
//! Each session gets its own [`MemoryBackend`], so a volume's contents live
//! exactly as long as its mount.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use fuser::{BackgroundSession, MountOption};
use tokio::runtime::Handle;
use tracing::{debug, info};

use memvol_kernel::{MemoryBackend, Owner, Session, SessionError, SessionFactory, VfsOps};

use crate::constants::{FS_SUBTYPE, VOLUME_ROOT_PERM};
use crate::filesystem::MemFs;

/// Starts one FUSE mount per volume.
#[derive(Debug, Clone)]
pub struct FuseSessionFactory {
    rt: Handle,
    owner: Owner,
}

impl FuseSessionFactory {
    /// Volume roots are owned by the daemon's own user and group.
    pub fn new(rt: Handle) -> Self {
        let owner = Owner::new(
            rustix::process::getuid().as_raw(),
            rustix::process::getgid().as_raw(),
        );
        Self { rt, owner }
    }

    fn mount_options(name: &str) -> Vec<MountOption> {
        vec![
            MountOption::AllowOther,
            MountOption::DefaultPermissions,
            MountOption::FSName(name.to_string()),
            MountOption::Subtype(FS_SUBTYPE.to_string()),
        ]
    }
}

#[async_trait]
impl SessionFactory for FuseSessionFactory {
    async fn start(&self, name: &str, mountpoint: &Path) -> Result<Box<dyn Session>, SessionError> {
        let vfs: Arc<dyn VfsOps> = Arc::new(MemoryBackend::with_root(self.owner, VOLUME_ROOT_PERM));
        let fs = MemFs::new(name, vfs, self.rt.clone());
        let options = Self::mount_options(name);
        let target = mountpoint.to_path_buf();

        // the mount syscall blocks until the kernel answers INIT
        let background = tokio::task::spawn_blocking(move || {
            fuser::spawn_mount2(fs, &target, &options)
        })
        .await
        .map_err(|e| SessionError::attach(mountpoint, std::io::Error::other(e)))?
        .map_err(|e| SessionError::attach(mountpoint, e))?;

        info!(volume = %name, mountpoint = %mountpoint.display(), "fuse session started");
        Ok(Box::new(FuseSession {
            mountpoint: mountpoint.to_path_buf(),
            background,
        }))
    }
}

/// A live FUSE mount. Stopping it unmounts and joins the session thread.
pub struct FuseSession {
    mountpoint: PathBuf,
    background: BackgroundSession,
}

#[async_trait]
impl Session for FuseSession {
    async fn stop(self: Box<Self>) -> Result<(), SessionError> {
        let FuseSession {
            mountpoint,
            background,
        } = *self;
        debug!(mountpoint = %mountpoint.display(), "unmounting fuse session");
        tokio::task::spawn_blocking(move || background.join())
            .await
            .map_err(|e| SessionError::detach(&mountpoint, e.to_string()))?;
        info!(mountpoint = %mountpoint.display(), "fuse session stopped");
        Ok(())
    }
}
