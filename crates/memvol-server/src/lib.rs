//! memvol server library
//!
//! Docker volume plugin serving each volume as an in-memory FUSE filesystem.

pub mod config;
pub mod constants;
pub mod driver;
pub mod filesystem;
pub mod fuse_session;
pub mod inode;
pub mod memlock;
pub mod plugin;
pub mod protocol;

pub use config::PluginConfig;
pub use driver::MemDriver;
pub use filesystem::MemFs;
pub use fuse_session::{FuseSession, FuseSessionFactory};
pub use memlock::MemLock;
pub use plugin::{PluginError, router, serve};
