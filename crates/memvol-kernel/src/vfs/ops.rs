//! VFS operations trait.
//!
//! Path-based, no inodes, explicit offset/size.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::types::{DirEntry, FileAttr, Owner, SetAttr, StatFs};
use super::VfsResult;

/// Core VFS operations trait.
///
/// All operations are path-based (no inode numbers). The FUSE adapter
/// handles inode ↔ path mapping locally.
///
/// Paths are relative to the backend's root; a leading `/` is accepted and
/// ignored.
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get file attributes.
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Read directory entries, sorted by name.
    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Read up to `size` bytes starting at `offset`.
    ///
    /// Returns fewer bytes if EOF is reached.
    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>>;

    /// Read symbolic link target.
    async fn readlink(&self, path: &Path) -> VfsResult<PathBuf>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write `data` at `offset`, returning the number of bytes written.
    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32>;

    /// Create a new regular file owned by `owner`.
    ///
    /// The parent directory must exist.
    async fn create(&self, path: &Path, mode: u32, owner: Owner) -> VfsResult<FileAttr>;

    /// Create a new directory owned by `owner`.
    async fn mkdir(&self, path: &Path, mode: u32, owner: Owner) -> VfsResult<FileAttr>;

    /// Remove a file or symlink.
    async fn unlink(&self, path: &Path) -> VfsResult<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, path: &Path) -> VfsResult<()>;

    /// Rename a file or directory, replacing `to` if it is compatible.
    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()>;

    /// Set file attributes. A `size` change truncates or zero-extends a file.
    async fn setattr(&self, path: &Path, attr: SetAttr) -> VfsResult<FileAttr>;

    /// Create a symlink at `path` pointing to `target`.
    async fn symlink(&self, path: &Path, target: &Path, owner: Owner) -> VfsResult<FileAttr>;

    /// Create a hard link at `newpath` pointing to `oldpath`.
    async fn link(&self, oldpath: &Path, newpath: &Path) -> VfsResult<FileAttr>;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Get filesystem statistics.
    async fn statfs(&self) -> VfsResult<StatFs>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool {
        self.getattr(path).await.is_ok()
    }
}
