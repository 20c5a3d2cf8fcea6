//! memvol plugin daemon
//!
//! Serves the Docker volume plugin protocol on a Unix socket and mounts each
//! requested volume as a fresh in-memory FUSE filesystem.
//!
//! ## Usage
//!
//! ```bash
//! # Defaults: /run/docker/plugins/mem.sock, volumes under /var/lib/docker-volumes/_mem
//! memvol
//!
//! # Somewhere else, with request logging
//! memvol --root /tmp/memvol --socket /tmp/memvol.sock --debug
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::runtime::Handle;
use tokio::signal::unix::{SignalKind, signal};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use memvol_kernel::MountRegistry;
use memvol_server::constants::{DEFAULT_ROOT, DEFAULT_SOCKET_PATH};
use memvol_server::{FuseSessionFactory, MemDriver, MemLock, PluginConfig, memlock, plugin};

/// Docker volume plugin for in-memory filesystems.
#[derive(Parser, Debug)]
#[command(name = "memvol")]
#[command(about = "Docker volume plugin serving in-memory FUSE filesystems")]
struct Args {
    /// Directory volumes are mounted under
    #[arg(long, env = "MEMVOL_ROOT", default_value = DEFAULT_ROOT)]
    root: PathBuf,

    /// Unix socket to serve the plugin protocol on
    #[arg(long, env = "MEMVOL_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// Log every plugin and filesystem request
    #[arg(short, long, env = "MEMVOL_DEBUG")]
    debug: bool,
}

impl From<Args> for PluginConfig {
    fn from(args: Args) -> Self {
        Self {
            root: args.root,
            socket: args.socket,
            debug: args.debug,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = PluginConfig::from(Args::parse());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_log_filter()));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match memlock::lock_all().context("could not lock memory to keep volumes out of swap")? {
        MemLock::Locked => tracing::debug!("memory locked"),
        MemLock::Unsupported => tracing::warn!("mlockall() not implemented on this system"),
        MemLock::InsufficientResources => tracing::warn!("mlockall() failed with ENOMEM"),
    }

    let sessions = Arc::new(FuseSessionFactory::new(Handle::current()));
    let registry = Arc::new(MountRegistry::new(&config.root, sessions));
    let driver = MemDriver::new(Arc::clone(&registry));

    tracing::info!(
        root = %config.root.display(),
        socket = %config.socket.display(),
        "starting memvol"
    );

    let served = plugin::serve(&config.socket, driver, shutdown_signal()).await;

    // unmount everything before the serving threads go away with the process
    registry.shutdown().await;
    served.with_context(|| format!("plugin server on {} failed", config.socket.display()))?;

    tracing::info!("memvol stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown requested");
}
