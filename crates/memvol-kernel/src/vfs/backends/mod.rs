//! VFS backends.
//!
//! Backends implement [`VfsOps`](super::VfsOps). Volumes only ever need the
//! in-memory one.

mod memory;

pub use memory::MemoryBackend;
