//! # memvol-kernel
//!
//! Mount lifecycle core for the memvol volume plugin.
//!
//! A volume is a name. Mounting it the first time starts a session that
//! serves a fresh in-memory filesystem at `root/<name>`; later mounts of the
//! same name only bump a reference count. The last unmount stops the session.
//!
//! - [`MountRegistry`] owns the table of active mounts and its lock
//! - [`SessionFactory`] / [`Session`] are the seam to whatever attaches the
//!   filesystem to the OS (FUSE in `memvol-server`)
//! - [`vfs`] is the in-memory filesystem those sessions serve

pub mod error;
pub mod mountpoint;
pub mod registry;
pub mod session;
pub mod vfs;

#[cfg(any(test, feature = "test-mock"))]
pub mod testing;

pub use error::{VolumeError, VolumeResult};
pub use mountpoint::mountpoint;
pub use registry::{MountInfo, MountRegistry};
pub use session::{Session, SessionError, SessionFactory};
pub use vfs::{
    DirEntry, FileAttr, FileType, MemoryBackend, Owner, SetAttr, StatFs, VfsError, VfsOps,
    VfsResult,
};
