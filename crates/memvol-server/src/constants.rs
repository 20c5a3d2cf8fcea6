//! Server configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Socket the Docker daemon discovers the plugin through.
pub const DEFAULT_SOCKET_PATH: &str = "/run/docker/plugins/mem.sock";

/// Directory all volume mountpoints are created under.
pub const DEFAULT_ROOT: &str = "/var/lib/docker-volumes/_mem";

/// Content type of every plugin protocol response.
pub const PLUGIN_CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1.1+json";

/// Plugin subsystem implemented by this daemon.
pub const VOLUME_DRIVER: &str = "VolumeDriver";

/// Scope reported to Docker; volumes never leave this host.
pub const VOLUME_SCOPE: &str = "local";

/// Filesystem type suffix shown in the mount table (`fuse.mem`).
pub const FS_SUBTYPE: &str = "mem";

/// Permissions of a fresh volume's root directory.
pub const VOLUME_ROOT_PERM: u32 = 0o755;

/// How long the kernel may cache attributes and entries.
pub const ATTR_TTL: Duration = Duration::from_secs(1);
