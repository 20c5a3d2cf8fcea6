//! In-memory virtual filesystem.
//!
//! This is the filesystem a volume session serves. Key components:
//!
//! - [`VfsOps`] - Core trait for filesystem operations
//! - [`MemoryBackend`] - Ephemeral tree, one per session
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: Operations use paths, not inode numbers.
//!   The FUSE adapter handles inode ↔ path mapping locally.
//! - **Explicit offset/size**: Read/write take offset and size, so the
//!   adapter needs no per-handle state.
//! - **Ownership on create**: Nodes record the creating uid/gid so the
//!   kernel's `default_permissions` checks behave like a real filesystem.

pub mod backends;
mod error;
mod ops;
mod types;

pub use backends::MemoryBackend;
pub use error::{VfsError, VfsResult};
pub use ops::VfsOps;
pub use types::{DirEntry, FileAttr, FileType, Owner, SetAttr, StatFs};
