//! Daemon configuration.

use std::path::PathBuf;

use crate::constants::{DEFAULT_ROOT, DEFAULT_SOCKET_PATH};

/// Runtime configuration for the plugin daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    /// Directory volumes are mounted under.
    pub root: PathBuf,
    /// Unix socket the plugin protocol is served on.
    pub socket: PathBuf,
    /// Verbose logging, including every filesystem request.
    pub debug: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            socket: PathBuf::from(DEFAULT_SOCKET_PATH),
            debug: false,
        }
    }
}

impl PluginConfig {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PluginConfig::default();
        assert_eq!(config.root, PathBuf::from("/var/lib/docker-volumes/_mem"));
        assert_eq!(config.socket, PathBuf::from("/run/docker/plugins/mem.sock"));
        assert!(!config.debug);
        assert_eq!(config.default_log_filter(), "info");
    }

    #[test]
    fn test_debug_filter() {
        let config = PluginConfig {
            debug: true,
            ..Default::default()
        };
        assert_eq!(config.default_log_filter(), "debug");
    }
}
